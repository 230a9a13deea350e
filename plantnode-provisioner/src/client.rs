//! HTTP client for a node's provisioning surface

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{CONTENT_TYPE, HOST};
use hyper::{Method, StatusCode};
use plantnode_proto::provisioning::{
    CONTENT_TYPE_FORM, FIELD_PASSWORD, FIELD_SSID, PATH_CONNECT, PATH_HEALTH, PATH_MAC,
    PATH_SAVE_CREDENTIALS, PATH_SSID,
};
use plantnode_proto::{encode_form, DeviceIdentity, ScanEntry};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("cannot reach node: {0}")]
    Io(#[from] std::io::Error),
    #[error("http error: {0}")]
    Http(#[from] hyper::Error),
    #[error("invalid request: {0}")]
    Request(#[from] hyper::http::Error),
    #[error("node answered {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

pub struct NodeClient {
    authority: String,
}

impl NodeClient {
    /// `node` is a host or `host:port`; port 80 is assumed when absent
    pub fn new(node: &str) -> Self {
        Self {
            authority: authority(node),
        }
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub async fn health(&self) -> Result<String, ClientError> {
        self.get(PATH_HEALTH).await
    }

    pub async fn mac(&self) -> Result<DeviceIdentity, ClientError> {
        let body = self.get(PATH_MAC).await?;
        DeviceIdentity::parse(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    pub async fn scan(&self) -> Result<Vec<ScanEntry>, ClientError> {
        let body = self.get(PATH_SSID).await?;
        serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    pub async fn save_credentials(&self, ssid: &str, password: &str) -> Result<String, ClientError> {
        let form = encode_form(&[(FIELD_SSID, ssid), (FIELD_PASSWORD, password)]);
        self.send(Method::POST, PATH_SAVE_CREDENTIALS, Some(form)).await
    }

    pub async fn connect(&self) -> Result<String, ClientError> {
        self.get(PATH_CONNECT).await
    }

    async fn get(&self, path: &str) -> Result<String, ClientError> {
        self.send(Method::GET, path, None).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        form: Option<String>,
    ) -> Result<String, ClientError> {
        let stream = tokio::net::TcpStream::connect(&self.authority).await?;
        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;
        tokio::task::spawn(async move {
            if let Err(e) = conn.await {
                eprintln!("connection error: {e:?}");
            }
        });

        let mut builder = hyper::Request::builder()
            .method(method)
            .uri(path)
            .header(HOST, &self.authority);
        if form.is_some() {
            builder = builder.header(CONTENT_TYPE, CONTENT_TYPE_FORM);
        }
        let request = builder.body(Full::new(Bytes::from(form.unwrap_or_default())))?;

        let response = sender.send_request(request).await?;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();
        let body = String::from_utf8_lossy(&bytes).into_owned();

        if !status.is_success() {
            return Err(ClientError::Status { status, body });
        }
        Ok(body)
    }
}

fn authority(node: &str) -> String {
    let node = node
        .trim_start_matches("http://")
        .trim_end_matches('/');
    if node.contains(':') {
        node.to_string()
    } else {
        format!("{node}:80")
    }
}

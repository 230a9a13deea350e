use std::sync::Arc;

use log::*;

use crate::Allowlist;

pub type HttpResult<E = std::io::Error> = Result<HttpResponse, E>;

pub type HttpResponse =
    hyper::Response<http_body_util::combinators::BoxBody<hyper::body::Bytes, std::io::Error>>;

/// Accept connections on `listener` forever
pub async fn run_server(listener: tokio::net::TcpListener, allow: Arc<Allowlist>) {
    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                tokio::task::spawn(handle_connection(stream, allow.clone()));
            }
            Err(e) => {
                error!("failed to accept: {e:?}");
                continue;
            }
        }
    }
}

async fn handle_connection(stream: tokio::net::TcpStream, allow: Arc<Allowlist>) {
    let io = hyper_util::rt::TokioIo::new(stream);

    let builder =
        hyper_util::server::conn::auto::Builder::new(hyper_util::rt::tokio::TokioExecutor::new());
    let conn = builder.serve_connection(
        io,
        hyper::service::service_fn(|r| handle_request(r, allow.clone())),
    );

    if let Err(e) = conn.await {
        warn!("connection error: {e:?}");
    }
}

async fn handle_request(
    r: hyper::Request<hyper::body::Incoming>,
    allow: Arc<Allowlist>,
) -> HttpResult {
    let path = r.uri().path();
    if r.method() != hyper::Method::GET {
        return bytes_to_resp(vec![], hyper::StatusCode::METHOD_NOT_ALLOWED);
    }

    match allow.answer(path) {
        Some(code) => {
            info!("registration check {path} -> {code}");
            let status =
                hyper::StatusCode::from_u16(code).unwrap_or(hyper::StatusCode::NO_CONTENT);
            bytes_to_resp(vec![], status)
        }
        None => not_found_(format!("not found: {path}")),
    }
}

pub fn bytes_to_resp(bytes: Vec<u8>, status: hyper::StatusCode) -> HttpResult {
    use http_body_util::BodyExt;

    let mut r = hyper::Response::new(
        http_body_util::Full::new(hyper::body::Bytes::from(bytes))
            .map_err(|e| match e {})
            .boxed(),
    );
    *r.status_mut() = status;
    Ok(r)
}

pub fn not_found_(m: String) -> HttpResult {
    bytes_to_resp(m.into_bytes(), hyper::StatusCode::NOT_FOUND)
}

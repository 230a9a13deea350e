//! Local HTTP control surface served from the access point
//!
//! Routing is a static table of `(method, path) -> handler`. Handlers are
//! plain functions over a [`ProvisioningControl`] so they can be exercised
//! without a radio or a socket. A handler never talks to the radio about
//! station mode itself; it returns a [`ControlAction`] and the supervisor
//! performs it after the response has been sent.

use std::fmt;
use std::time::Duration;

use log::*;
use plantnode_proto::provisioning::{
    BODY_MISSING_FIELD, BODY_OK, CONTENT_TYPE_JSON, CONTENT_TYPE_TEXT, FIELD_PASSWORD, FIELD_SSID,
    PATH_CONNECT, PATH_HEALTH, PATH_MAC, PATH_SAVE_CREDENTIALS, PATH_SSID,
};
use plantnode_proto::{parse_form, DeviceIdentity, ScanEntry};

use crate::storage::{Credentials, CredentialsError, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Options,
}

impl Method {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Some(Method::Get),
            "POST" => Some(Method::Post),
            "OPTIONS" => Some(Method::Options),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: String,
    pub body: String,
}

impl Request {
    /// `uri` may carry a query string
    pub fn new(method: Method, uri: &str) -> Self {
        let (path, query) = uri.split_once('?').unwrap_or((uri, ""));
        Self {
            method,
            path: path.to_string(),
            query: query.to_string(),
            body: String::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Look up a field in the form body, then in the query string
    pub fn arg(&self, name: &str) -> Option<String> {
        [&self.body, &self.query].into_iter().find_map(|source| {
            parse_form(source)
                .into_iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: Option<&'static str>,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

impl Response {
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: Some(CONTENT_TYPE_TEXT),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: Some(CONTENT_TYPE_JSON),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn empty(status: u16) -> Self {
        Self {
            status,
            content_type: None,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Follow-up work for the supervisor once the response is out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    /// Try the stored credentials in station mode
    ConnectStation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub response: Response,
    pub action: Option<ControlAction>,
}

impl Reply {
    pub fn then(mut self, action: ControlAction) -> Self {
        self.action = Some(action);
        self
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Self {
            response,
            action: None,
        }
    }
}

/// What handlers may do to the device
pub trait ProvisioningControl {
    /// One scan cycle, in discovery order
    fn scan(&mut self) -> Result<Vec<ScanEntry>, String>;

    fn identity(&self) -> &DeviceIdentity;

    fn save_credentials(&mut self, credentials: &Credentials) -> Result<(), StoreError>;

    fn has_credentials(&self) -> bool;
}

/// Where access point requests come from, implemented by the board crate
///
/// `next_request` hands out at most one request; the caller must
/// `respond` to it before asking for the next one.
pub trait RequestSource {
    type Error: fmt::Display;

    fn start(&mut self) -> Result<(), Self::Error>;

    fn stop(&mut self);

    fn is_running(&self) -> bool;

    /// Wait up to `timeout` for a request
    fn next_request(&mut self, timeout: Duration) -> Option<Request>;

    fn respond(&mut self, response: Response);
}

pub type Handler = fn(&mut dyn ProvisioningControl, &Request) -> Reply;

pub struct Route {
    pub method: Method,
    pub path: &'static str,
    pub handler: Handler,
}

pub const ALLOW_ORIGIN: &str = "Access-Control-Allow-Origin";

pub struct ProvisioningServer {
    routes: Vec<Route>,
}

impl Default for ProvisioningServer {
    fn default() -> Self {
        Self::new()
    }
}

impl ProvisioningServer {
    pub fn new() -> Self {
        let routes = vec![
            Route {
                method: Method::Get,
                path: PATH_SSID,
                handler: handle_scan,
            },
            Route {
                method: Method::Get,
                path: PATH_MAC,
                handler: handle_identity,
            },
            Route {
                method: Method::Get,
                path: PATH_CONNECT,
                handler: handle_connect,
            },
            Route {
                method: Method::Post,
                path: PATH_SAVE_CREDENTIALS,
                handler: handle_save_credentials,
            },
            Route {
                method: Method::Get,
                path: PATH_HEALTH,
                handler: handle_health,
            },
        ];
        Self { routes }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn dispatch(&self, control: &mut dyn ProvisioningControl, request: &Request) -> Reply {
        info!("{} {}", request.method, request.path);

        let reply = if request.method == Method::Options {
            Response::empty(204)
                .with_header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
                .with_header("Access-Control-Allow-Headers", "Content-Type")
                .into()
        } else if let Some(route) = self
            .routes
            .iter()
            .find(|r| r.method == request.method && r.path == request.path)
        {
            (route.handler)(control, request)
        } else if self.routes.iter().any(|r| r.path == request.path) {
            Response::text(405, "Method not allowed").into()
        } else {
            Response::text(404, "Not found").into()
        };

        Reply {
            response: reply.response.with_header(ALLOW_ORIGIN, "*"),
            action: reply.action,
        }
    }
}

fn handle_scan(control: &mut dyn ProvisioningControl, _request: &Request) -> Reply {
    let entries = match control.scan() {
        Ok(entries) => entries,
        Err(e) => {
            error!("Scan failed: {e}");
            return Response::text(500, "Scan failed").into();
        }
    };
    info!("Scan found {} networks", entries.len());

    match serde_json::to_string(&entries) {
        Ok(json) => Response::json(200, json).into(),
        Err(e) => {
            error!("Failed to encode scan result: {e}");
            Response::text(500, "Scan failed").into()
        }
    }
}

fn handle_identity(control: &mut dyn ProvisioningControl, _request: &Request) -> Reply {
    Response::text(200, control.identity().as_str()).into()
}

fn handle_connect(control: &mut dyn ProvisioningControl, _request: &Request) -> Reply {
    if !control.has_credentials() {
        return Response::text(409, "No stored credentials").into();
    }
    Reply::from(Response::text(200, "connecting")).then(ControlAction::ConnectStation)
}

fn handle_save_credentials(control: &mut dyn ProvisioningControl, request: &Request) -> Reply {
    let ssid = request.arg(FIELD_SSID).unwrap_or_default();
    let password = request.arg(FIELD_PASSWORD).unwrap_or_default();

    let credentials = match Credentials::new(ssid, password) {
        Ok(credentials) => credentials,
        Err(CredentialsError::Missing) => return Response::text(400, BODY_MISSING_FIELD).into(),
        Err(e) => return Response::text(400, e.to_string()).into(),
    };

    if let Err(e) = control.save_credentials(&credentials) {
        error!("Failed to save credentials: {e}");
        return Response::text(500, "Failed to save credentials").into();
    }

    Reply::from(Response::text(200, BODY_OK)).then(ControlAction::ConnectStation)
}

fn handle_health(_control: &mut dyn ProvisioningControl, _request: &Request) -> Reply {
    Response::text(200, BODY_OK).into()
}

//! Provisioning listener on top of the esp-idf HTTP server
//!
//! The server runs its handlers on its own task. Each handler forwards the
//! request to the control loop and blocks until the loop answers, so all
//! device state stays owned by the loop.

use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use embedded_svc::http::{Headers, Method as HttpMethod};
use embedded_svc::io::{Read, Write};
use esp_idf_svc::http::server::{Configuration, EspHttpConnection, EspHttpServer};
use log::*;
use plantnode_mcu::{Method, Request, RequestSource, Response};

const MAX_BODY: usize = 1024;
/// How long a handler waits for the control loop
const REPLY_TIMEOUT: Duration = Duration::from_secs(30);
/// A request queued longer than this is dropped unserved; the margin leaves
/// room for the dispatch itself before the handler gives up
const STALE_AFTER: Duration = Duration::from_secs(25);

struct Pending {
    request: Request,
    reply: SyncSender<Response>,
    queued: Instant,
}

impl Pending {
    fn is_stale(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.queued) >= STALE_AFTER
    }
}

pub struct HttpListener {
    server: Option<EspHttpServer<'static>>,
    inbox: Receiver<Pending>,
    outbox: Sender<Pending>,
    in_flight: Option<SyncSender<Response>>,
}

impl Default for HttpListener {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpListener {
    pub fn new() -> Self {
        let (outbox, inbox) = mpsc::channel();
        Self {
            server: None,
            inbox,
            outbox,
            in_flight: None,
        }
    }
}

impl RequestSource for HttpListener {
    type Error = anyhow::Error;

    fn start(&mut self) -> anyhow::Result<()> {
        let conf = Configuration {
            stack_size: 10 * 1024,
            uri_match_wildcard: true,
            ..Default::default()
        };
        let mut server = EspHttpServer::new(&conf)?;

        for (http_method, method) in [
            (HttpMethod::Get, Method::Get),
            (HttpMethod::Post, Method::Post),
            (HttpMethod::Options, Method::Options),
        ] {
            let outbox = self.outbox.clone();
            server.fn_handler::<anyhow::Error, _>("/*", http_method, move |mut req| {
                let request = Request::new(method, req.uri()).with_body(read_body(&mut req)?);

                let (reply, response) = mpsc::sync_channel(1);
                outbox
                    .send(Pending {
                        request,
                        reply,
                        queued: Instant::now(),
                    })
                    .map_err(|_| anyhow!("control loop is gone"))?;
                let response = response
                    .recv_timeout(REPLY_TIMEOUT)
                    .unwrap_or_else(|_| Response::text(503, "Busy"));

                let mut headers: Vec<(&str, &str)> = response
                    .headers
                    .iter()
                    .map(|(k, v)| (*k, v.as_str()))
                    .collect();
                if let Some(content_type) = response.content_type {
                    headers.push(("Content-Type", content_type));
                }

                req.into_response(response.status, None, &headers)?
                    .write_all(response.body.as_bytes())?;
                Ok(())
            })?;
        }

        self.server = Some(server);
        Ok(())
    }

    fn stop(&mut self) {
        // dropping the server stops it
        self.server = None;
        self.in_flight = None;
        let dropped = self.inbox.try_iter().count();
        if dropped > 0 {
            warn!("Dropped {dropped} request(s) queued before the server stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.server.is_some()
    }

    fn next_request(&mut self, timeout: Duration) -> Option<Request> {
        let pending = next_live(&self.inbox, timeout, Instant::now)?;
        self.in_flight = Some(pending.reply);
        Some(pending.request)
    }

    fn respond(&mut self, response: Response) {
        match self.in_flight.take() {
            Some(reply) => {
                if reply.send(response).is_err() {
                    warn!("HTTP handler gave up before the response was ready");
                }
            }
            None => warn!("Response without a pending request"),
        }
    }
}

/// Next request whose handler is still waiting. Requests whose handler
/// already answered 503 are discarded, never dispatched.
fn next_live(
    inbox: &Receiver<Pending>,
    timeout: Duration,
    now: impl Fn() -> Instant,
) -> Option<Pending> {
    let deadline = now() + timeout;
    loop {
        let wait = deadline.saturating_duration_since(now());
        let pending = inbox.recv_timeout(wait).ok()?;
        if !pending.is_stale(now()) {
            return Some(pending);
        }
        warn!(
            "Discarding stale {} {} request",
            pending.request.method, pending.request.path
        );
    }
}

fn read_body(
    req: &mut esp_idf_svc::http::server::Request<&mut EspHttpConnection<'_>>,
) -> anyhow::Result<String> {
    let len = req.content_len().unwrap_or(0) as usize;
    if len > MAX_BODY {
        return Err(anyhow!("request body too large"));
    }

    let mut body = vec![0u8; len];
    if len > 0 {
        req.read_exact(&mut body).map_err(|e| anyhow!("{e:?}"))?;
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}

//! Outbound HTTP for the registration check

use std::time::Duration;

use anyhow::anyhow;
use embedded_svc::http::client::Client;
use embedded_svc::http::{Method, Status};
use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
use plantnode_mcu::HttpClient;

pub struct EspHttpClient {
    timeout: Duration,
}

impl EspHttpClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl HttpClient for EspHttpClient {
    type Error = anyhow::Error;

    fn get(&mut self, url: &str) -> anyhow::Result<u16> {
        // one connection per request, the check runs once per boot
        let conf = Configuration {
            timeout: Some(self.timeout),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };
        let mut client = Client::wrap(EspHttpConnection::new(&conf)?);
        let request = client.request(Method::Get, url, &[])?;
        let response = request.submit().map_err(|e| anyhow!("{e:?}"))?;
        Ok(response.status())
    }
}

//! Transport abstraction for posting messages to the collector.
//!
//! The [`Transport`] trait decouples the reporter from the HTTP stack. Tests
//! use scripted transports that record documents and return predetermined
//! faults without touching the network.

use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::core::classifier::{TransportError, TransportFault};
use crate::io::config::CollectorConfig;

/// Abstraction over the collector endpoint.
pub trait Transport {
    /// Deliver one message. Transient faults should surface as
    /// [`TransportError`] so the send guard can classify them.
    fn send(&self, document: &Value) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, document: &Value) -> Result<()> {
        (**self).send(document)
    }
}

impl<T: Transport + ?Sized> Transport for Rc<T> {
    fn send(&self, document: &Value) -> Result<()> {
        (**self).send(document)
    }
}

/// Blocking HTTP transport that POSTs JSON to the collector URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    url: Url,
}

impl HttpTransport {
    pub fn new(url: &str, timeout: Duration, headers: &[(String, String)]) -> Result<Self> {
        let url = Url::parse(url).with_context(|| format!("parse collector url {url}"))?;
        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("invalid header name {name}"))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("invalid value for header {name}"))?;
            header_map.insert(name, value);
        }
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(header_map)
            .build()
            .context("build http client")?;
        Ok(Self { client, url })
    }

    /// Transport for the configured endpoint; `None` when reporting is off.
    pub fn from_config(cfg: &CollectorConfig) -> Result<Option<Self>> {
        if !cfg.collector_enabled() {
            return Ok(None);
        }
        let url = cfg
            .server_url
            .as_deref()
            .ok_or_else(|| anyhow!("server_url missing"))?;
        let headers: Vec<(String, String)> = cfg
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Self::new(
            url,
            Duration::from_secs(cfg.request_timeout_secs),
            &headers,
        )
        .map(Some)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl Transport for HttpTransport {
    #[instrument(skip_all, fields(url = %self.url))]
    fn send(&self, document: &Value) -> Result<()> {
        let response = self
            .client
            .post(self.url.clone())
            .json(document)
            .send()
            .map_err(send_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::new(
                TransportFault::Protocol,
                format!("collector responded with HTTP {status}"),
            )
            .into());
        }
        debug!(status = status.as_u16(), "collector accepted message");
        Ok(())
    }
}

/// Wrap a reqwest failure, tagging it with a fault when it is transient.
fn send_error(err: reqwest::Error) -> anyhow::Error {
    match fault_for(&err) {
        Some(fault) => {
            TransportError::with_source(fault, "send to data collector", err).into()
        }
        None => anyhow::Error::new(err).context("send to data collector"),
    }
}

fn fault_for(err: &reqwest::Error) -> Option<TransportFault> {
    if err.is_timeout() {
        return Some(TransportFault::ConnectionTimeout);
    }
    let io_fault = io_fault_in_chain(err);
    if io_fault.is_some() {
        return io_fault;
    }
    // Connect failures without a socket error kind (DNS lookup, TLS setup)
    // are not transient.
    if err.is_connect() {
        None
    } else if err.is_decode() || err.is_body() {
        Some(TransportFault::BadResponse)
    } else if err.is_request() {
        Some(TransportFault::Protocol)
    } else {
        None
    }
}

fn io_fault_in_chain(err: &reqwest::Error) -> Option<TransportFault> {
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<std::io::Error>() {
            let fault = TransportFault::from_io_kind(io_err.kind());
            if fault.is_some() {
                return fault;
            }
        }
        source = cause.source();
    }
    None
}

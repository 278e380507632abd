//! Test doubles for the resolver and transport seams.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::IpAddr;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::services::validator::Resolver;
use crate::utils::http::{FetchProfile, HttpTransport, TransportError, TransportResponse};

/// Resolver answering from a fixed host table; unknown hosts fail.
#[derive(Default)]
pub struct StaticResolver {
    hosts: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: &str, addrs: &[&str]) -> Self {
        let addrs = addrs.iter().map(|a| a.parse().unwrap()).collect();
        self.hosts.insert(host.to_string(), addrs);
        self
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        self.hosts
            .get(host)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such host"))
    }
}

/// A recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportCall {
    pub url: String,
    pub profile: &'static str,
}

/// Transport replaying queued responses and recording every call.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    calls: Mutex<Vec<TransportCall>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_html(self, url: &str, html: &str) -> Self {
        self.with_response(url, 200, Some("text/html; charset=utf-8"), html)
    }

    pub fn with_status(self, url: &str, status: u16) -> Self {
        self.with_response(url, status, Some("text/html"), "")
    }

    pub fn with_response(
        self,
        final_url: &str,
        status: u16,
        content_type: Option<&str>,
        body: &str,
    ) -> Self {
        self.responses.lock().push_back(Ok(TransportResponse {
            status,
            content_type: content_type.map(|c| c.to_string()),
            final_url: final_url.to_string(),
            body: body.to_string(),
            truncated: false,
        }));
        self
    }

    pub fn with_error(self, message: &str) -> Self {
        self.responses
            .lock()
            .push_back(Err(TransportError::new(message)));
        self
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(
        &self,
        url: &str,
        profile: &FetchProfile,
    ) -> Result<TransportResponse, TransportError> {
        self.calls.lock().push(TransportCall {
            url: url.to_string(),
            profile: profile.name,
        });
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::new("no scripted response left")))
    }
}

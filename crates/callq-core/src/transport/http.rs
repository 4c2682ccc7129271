//! HTTP transport backed by libcurl's easy interface.
//!
//! Each dispatched call gets its own `Easy` handle on a named worker thread,
//! or runs on the dispatching thread when the call is synchronous.

use anyhow::{Context, Result};
use std::str;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::form::{append_query, encode_form, resolve_url, sends_query};
use super::parse::parse_headers;
use super::{Completion, Request, Response, Transport};
use crate::config::TransportConfig;

struct Settings {
    config: TransportConfig,
    base_url: Option<Url>,
}

/// `Transport` that performs real HTTP requests with curl.
#[derive(Clone)]
pub struct CurlTransport {
    settings: Arc<Settings>,
}

impl CurlTransport {
    /// Build a transport from config. Fails if `base_url` is not a valid URL.
    pub fn new(config: TransportConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .map(|u| Url::parse(u).with_context(|| format!("invalid transport.base_url: {u}")))
            .transpose()?;
        Ok(Self {
            settings: Arc::new(Settings { config, base_url }),
        })
    }
}

impl std::fmt::Debug for CurlTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurlTransport")
            .field("config", &self.settings.config)
            .finish()
    }
}

impl Transport for CurlTransport {
    fn send(&self, request: Request, completion: Completion) {
        if request.synchronous {
            run(&self.settings, &request, completion);
            return;
        }
        let settings = Arc::clone(&self.settings);
        let name = match completion.call_id() {
            Some(id) => format!("callq-call-{}", id.get()),
            None => "callq-call".to_string(),
        };
        // On spawn failure the closure (and its completion) is dropped, which
        // rejects the call instead of leaving it pending.
        if let Err(e) = std::thread::Builder::new()
            .name(name)
            .spawn(move || run(&settings, &request, completion))
        {
            tracing::error!("could not spawn transport thread: {}", e);
        }
    }
}

fn run(settings: &Settings, request: &Request, completion: Completion) {
    if completion.is_abandoned() {
        tracing::debug!(url = %request.url, "call abandoned before transfer; skipping");
        return;
    }
    match perform(settings, request) {
        Ok(resp) if (200..300).contains(&resp.status) => completion.success(resp),
        Ok(resp) => completion.error(resp.status.to_string(), resp.body),
        // No HTTP status was received.
        Err(e) => completion.error("0", format!("{e:#}")),
    }
}

fn perform(settings: &Settings, request: &Request) -> Result<Response> {
    let cfg = &settings.config;
    let method = request.method.as_str();
    let form = encode_form(&request.data);
    let mut url = resolve_url(settings.base_url.as_ref(), &request.url)?;
    if sends_query(method) {
        url = append_query(&url, &form);
    }

    let mut easy = curl::easy::Easy::new();
    easy.url(&url).context("invalid URL")?;
    easy.follow_location(true)?;
    easy.max_redirections(cfg.max_redirections)?;
    easy.connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))?;
    easy.timeout(Duration::from_secs(cfg.timeout_secs))?;
    if let Some(ref ua) = cfg.user_agent {
        easy.useragent(ua)?;
    }

    let mut list = curl::easy::List::new();
    match method {
        "GET" => {}
        "HEAD" => easy.nobody(true)?,
        _ => {
            easy.post(true)?;
            easy.post_fields_copy(form.as_bytes())?;
            list.append("Content-Type: application/x-www-form-urlencoded")?;
            // Small form bodies never need a 100-continue round trip.
            list.append("Expect:")?;
            if method != "POST" {
                easy.custom_request(method)?;
            }
        }
    }
    easy.http_headers(list)?;

    let mut header_lines: Vec<String> = Vec::new();
    let mut body: Vec<u8> = Vec::new();
    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                header_lines.push(s.trim_end().to_string());
            }
            true
        })?;
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer
            .perform()
            .with_context(|| format!("{method} {url} failed"))?;
    }

    let status = easy.response_code().context("no response code")?;
    tracing::debug!(%method, %url, status, bytes = body.len(), "transfer finished");
    Ok(Response {
        status,
        headers: parse_headers(&header_lines),
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

//! Payload encoding and URL resolution for HTTP calls.

use anyhow::{Context, Result};
use url::Url;

use crate::call::Payload;

/// Encode a payload as `application/x-www-form-urlencoded`.
/// Strings are sent verbatim, null as empty, other values as JSON text.
pub(crate) fn encode_form(data: &Payload) -> String {
    let mut ser = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in data {
        let text = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        };
        ser.append_pair(key, &text);
    }
    ser.finish()
}

/// Methods whose payload travels in the query string rather than the body.
pub(crate) fn sends_query(method: &str) -> bool {
    matches!(method, "GET" | "HEAD")
}

pub(crate) fn append_query(url: &str, query: &str) -> String {
    if query.is_empty() {
        url.to_string()
    } else if url.contains('?') {
        format!("{url}&{query}")
    } else {
        format!("{url}?{query}")
    }
}

/// Resolve `url` against `base` when it is relative.
pub(crate) fn resolve_url(base: Option<&Url>, url: &str) -> Result<String> {
    match Url::parse(url) {
        Ok(abs) => Ok(abs.to_string()),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = base.ok_or_else(|| {
                anyhow::anyhow!("relative URL {url} needs transport.base_url to be set")
            })?;
            Ok(base
                .join(url)
                .with_context(|| format!("cannot join {url} onto {base}"))?
                .to_string())
        }
        Err(e) => Err(anyhow::anyhow!("invalid URL {url}: {e}")),
    }
}

//! Batch files: an ordered list of calls to submit to one service.
//!
//! ```toml
//! [[call]]
//! url = "/orders"
//! method = "POST"
//! pipe = "orders"
//!
//! [call.data]
//! sku = "A-1"
//! qty = 2
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::call::CallArgs;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchFile {
    #[serde(default, rename = "call")]
    pub calls: Vec<CallArgs>,
}

impl BatchFile {
    pub fn parse(text: &str) -> Result<Self> {
        let batch: BatchFile = toml::from_str(text).context("invalid batch file")?;
        if let Some(pos) = batch.calls.iter().position(|c| c.url.trim().is_empty()) {
            anyhow::bail!("call #{} has an empty url", pos + 1);
        }
        Ok(batch)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("read batch file: {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("load batch file: {}", path.display()))
    }
}

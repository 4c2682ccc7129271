//! CLI for the callq request coordinator.

mod commands;

use anyhow::Result;
use callq_core::config::{self, CallqConfig};
use callq_core::{CallArgs, CurlTransport, Service, ServiceOptions, UnloadChecks};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use commands::{run_batch, run_call};

/// Top-level CLI for callq.
#[derive(Debug, Parser)]
#[command(name = "callq")]
#[command(about = "callq: ordered, abandonable HTTP calls", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run one call and print its status and body.
    Call(CallOpts),

    /// Submit every `[[call]]` entry of a TOML file, in file order.
    Batch {
        /// Path to the batch file.
        path: PathBuf,

        /// Close the read-only gate: only calls marked `read_only` may run.
        #[arg(long)]
        read_only: bool,
    },
}

#[derive(Debug, Args)]
pub struct CallOpts {
    /// Absolute URL, or a path joined onto `transport.base_url`.
    pub url: String,

    /// HTTP method.
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Payload entry as key=value (repeatable).
    #[arg(short = 'd', long = "data", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub data: Vec<(String, String)>,

    /// Serialize with other calls sharing this pipe name.
    #[arg(long)]
    pub pipe: Option<String>,

    /// Jump to the front of the pipe's waiting calls.
    #[arg(long)]
    pub prioritize: bool,

    /// Mark the call read-only (allowed through a closed gate).
    #[arg(long)]
    pub read_only: bool,

    /// Perform the transfer on the calling thread.
    #[arg(long)]
    pub sync: bool,
}

impl CallOpts {
    pub fn into_call_args(self) -> CallArgs {
        let mut args = CallArgs::new(self.method, self.url)
            .with_read_only(self.read_only)
            .with_priority(self.prioritize)
            .with_sync(self.sync);
        if let Some(pipe) = self.pipe {
            args = args.with_pipe(pipe);
        }
        for (key, value) in self.data {
            args = args.with_data(key, value);
        }
        args
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{s}`")),
    }
}

fn build_service(cfg: &CallqConfig, read_only: bool) -> Result<Service> {
    let transport = CurlTransport::new(cfg.transport.clone())?;
    Ok(Service::new(
        Arc::new(transport),
        UnloadChecks::new(),
        ServiceOptions {
            read_only: cfg.read_only || read_only,
        },
    ))
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Call(opts) => {
                let service = build_service(&cfg, false)?;
                run_call(&service, opts.into_call_args()).await?;
            }
            CliCommand::Batch { path, read_only } => {
                let service = build_service(&cfg, read_only)?;
                run_batch(&service, &path).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;

//! Tests for the batch subcommand.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use std::path::Path;

#[test]
fn cli_parse_batch() {
    match parse(&["callq", "batch", "calls.toml"]) {
        CliCommand::Batch { path, read_only } => {
            assert_eq!(path, Path::new("calls.toml"));
            assert!(!read_only);
        }
        _ => panic!("expected Batch"),
    }
}

#[test]
fn cli_parse_batch_read_only() {
    match parse(&["callq", "batch", "calls.toml", "--read-only"]) {
        CliCommand::Batch { read_only, .. } => assert!(read_only),
        _ => panic!("expected Batch"),
    }
}

#[test]
fn cli_parse_batch_requires_path() {
    assert!(Cli::try_parse_from(["callq", "batch"]).is_err());
}

#[test]
fn cli_parse_unknown_subcommand_fails() {
    assert!(Cli::try_parse_from(["callq", "run"]).is_err());
}

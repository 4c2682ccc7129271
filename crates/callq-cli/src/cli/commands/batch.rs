//! `callq batch <file>`: submit a batch file's calls to one service.

use anyhow::Result;
use callq_core::batch::BatchFile;
use callq_core::Service;
use std::path::Path;

use super::wait::wait_for_all;

pub async fn run_batch(service: &Service, path: &Path) -> Result<()> {
    let batch = BatchFile::load(path)?;
    let total = batch.calls.len();
    if total == 0 {
        println!("No calls in {}.", path.display());
        return Ok(());
    }
    tracing::info!(calls = total, file = %path.display(), "submitting batch");

    let handles = batch
        .calls
        .into_iter()
        .map(|args| service.call(args))
        .collect();
    let tally = wait_for_all(service, handles).await?;

    println!(
        "{} succeeded, {} failed, {} abandoned",
        tally.succeeded, tally.failed, tally.abandoned
    );
    if tally.failed > 0 {
        anyhow::bail!("{} of {} call(s) failed", tally.failed, total);
    }
    Ok(())
}

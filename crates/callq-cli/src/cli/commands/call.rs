//! `callq call <url>`: run one call.

use anyhow::Result;
use callq_core::{CallArgs, Service};

use super::wait::wait_for_all;

pub async fn run_call(service: &Service, args: CallArgs) -> Result<()> {
    let handle = service.call(args);
    let tally = wait_for_all(service, vec![handle]).await?;
    if tally.failed > 0 {
        anyhow::bail!("call failed");
    }
    Ok(())
}

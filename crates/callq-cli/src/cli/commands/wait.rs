//! Await submitted calls and handle Ctrl-C.
//!
//! The first Ctrl-C consults the unload registry. If a call is still pending
//! its warning is printed and a second Ctrl-C is required, which abandons
//! every pending call. With nothing pending the first Ctrl-C stops waiting.

use anyhow::{Context, Result};
use callq_core::{CallError, CallHandle, CallId, Response, Service};
use tokio::task::JoinSet;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub succeeded: usize,
    pub failed: usize,
    pub abandoned: usize,
}

/// What a Ctrl-C means given the unload registry's current warning.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Interrupt {
    /// Nothing is pending: stop waiting.
    Stop,
    /// First Ctrl-C with calls pending: show the warning and keep waiting.
    Warn(String),
    /// Second Ctrl-C with calls still pending: abandon them and stop.
    Abandon,
}

fn on_interrupt(warning: Option<String>, warned: bool) -> Interrupt {
    match warning {
        None => Interrupt::Stop,
        Some(_) if warned => Interrupt::Abandon,
        Some(text) => Interrupt::Warn(text),
    }
}

struct Settled {
    id: CallId,
    method: String,
    url: String,
    result: Result<Response, CallError>,
}

pub async fn wait_for_all(service: &Service, handles: Vec<CallHandle>) -> Result<Tally> {
    let mut set = JoinSet::new();
    for handle in handles {
        let id = handle.id();
        let method = handle.method().to_string();
        let url = handle.url().to_string();
        set.spawn(async move {
            let result = handle.await;
            Settled {
                id,
                method,
                url,
                result,
            }
        });
    }

    let mut tally = Tally::default();
    let mut warned = false;
    loop {
        tokio::select! {
            next = set.join_next() => match next {
                None => break,
                Some(Ok(settled)) => report(settled, &mut tally),
                Some(Err(e)) => {
                    tracing::error!("call task failed: {}", e);
                    tally.failed += 1;
                }
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("listen for Ctrl-C")?;
                match on_interrupt(service.unload_checks().warning_message(), warned) {
                    Interrupt::Stop => {
                        tracing::info!("interrupted with nothing pending");
                        break;
                    }
                    Interrupt::Warn(warning) => {
                        eprintln!("{}", warning);
                        eprintln!("Press Ctrl-C again to abandon pending calls and exit.");
                        warned = true;
                    }
                    Interrupt::Abandon => {
                        tally.abandoned += abandon_all(service);
                        set.abort_all();
                        break;
                    }
                }
            }
        }
    }
    Ok(tally)
}

fn abandon_all(service: &Service) -> usize {
    let abandoned: usize = service
        .pending_calls()
        .iter()
        .map(|call| service.abandon(&call.method, &call.url))
        .sum();
    tracing::info!(abandoned, "abandoned pending calls on interrupt");
    abandoned
}

fn report(settled: Settled, tally: &mut Tally) {
    let Settled {
        id,
        method,
        url,
        result,
    } = settled;
    match result {
        Ok(resp) => {
            tally.succeeded += 1;
            println!("{} {} {} -> {}", id, method, url, resp.status);
            if !resp.body.is_empty() {
                println!("{}", resp.body);
            }
        }
        Err(e) => {
            tally.failed += 1;
            eprintln!("{} {} {} failed: {}", id, method, url, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callq_core::{CallArgs, ManualTransport, ServiceOptions, UnloadChecks};
    use std::sync::Arc;

    fn service() -> (Service, Arc<ManualTransport>) {
        let transport = Arc::new(ManualTransport::new());
        let service = Service::new(
            transport.clone(),
            UnloadChecks::new(),
            ServiceOptions::default(),
        );
        (service, transport)
    }

    #[test]
    fn interrupt_with_nothing_pending_stops() {
        assert_eq!(on_interrupt(None, false), Interrupt::Stop);
        assert_eq!(on_interrupt(None, true), Interrupt::Stop);
    }

    #[test]
    fn first_interrupt_with_pending_calls_warns_then_second_abandons() {
        let (service, _transport) = service();
        let _h = service.call(CallArgs::post("/save"));

        let first = on_interrupt(service.unload_checks().warning_message(), false);
        assert_eq!(
            first,
            Interrupt::Warn("a call to POST /save is still pending".to_string())
        );
        let second = on_interrupt(service.unload_checks().warning_message(), true);
        assert_eq!(second, Interrupt::Abandon);
    }

    #[test]
    fn abandon_all_counts_each_pending_call_once() {
        let (service, transport) = service();
        let _a = service.call(CallArgs::post("/save"));
        let _b = service.call(CallArgs::post("/save").with_pipe("p"));
        let _c = service.call(CallArgs::post("/save").with_pipe("p"));
        let _d = service.call(CallArgs::get("/list"));
        assert_eq!(service.pending_len(), 4);

        assert_eq!(abandon_all(&service), 4);
        assert_eq!(service.pending_len(), 0);
        assert!(service.unload_checks().warning_message().is_none());
        assert_eq!(on_interrupt(service.unload_checks().warning_message(), true), Interrupt::Stop);
        // The waiting pipe member was never sent.
        assert_eq!(transport.sent_urls(), vec!["/save", "/save", "/list"]);
    }

    #[test]
    fn report_tallies_successes_and_failures() {
        let (service, _transport) = service();
        let id = service.call(CallArgs::get("/x")).id();
        let settled = |result| Settled {
            id,
            method: "GET".to_string(),
            url: "/x".to_string(),
            result,
        };

        let mut tally = Tally::default();
        report(settled(Ok(Response::new(200, "ok"))), &mut tally);
        report(settled(Ok(Response::new(204, ""))), &mut tally);
        report(settled(Err(CallError::transport("500", "boom"))), &mut tally);
        assert_eq!(
            tally,
            Tally {
                succeeded: 2,
                failed: 1,
                abandoned: 0
            }
        );
    }

    #[tokio::test]
    async fn wait_for_all_collects_outcomes() {
        let (service, transport) = service();
        let ok = service.call(CallArgs::get("/ok"));
        let bad = service.call(CallArgs::get("/bad"));
        transport
            .take("/ok")
            .unwrap()
            .completion
            .success(Response::new(200, "fine"));
        transport.take("/bad").unwrap().completion.error("404", "missing");

        let tally = wait_for_all(&service, vec![ok, bad]).await.unwrap();
        assert_eq!(tally.succeeded, 1);
        assert_eq!(tally.failed, 1);
        assert_eq!(tally.abandoned, 0);
    }
}

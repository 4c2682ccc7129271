//! Registry of unload checks: producers of "are you sure you want to leave?" text.
//!
//! The service registers one check per pending call; other code may register
//! its own checks for unrelated unsaved state. Whatever drives the exit warning
//! (the CLI's Ctrl-C handler) asks the registry for `warning_message()`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::lock::lock;

type Producer = Arc<dyn Fn() -> Option<String> + Send + Sync>;

struct Entry {
    seq: u64,
    producer: Producer,
}

#[derive(Default)]
struct Checks {
    next_seq: u64,
    entries: HashMap<String, Entry>,
}

/// Shared handle to a set of named unload checks. Clones refer to the same set.
#[derive(Clone, Default)]
pub struct UnloadChecks {
    inner: Arc<Mutex<Checks>>,
}

impl std::fmt::Debug for UnloadChecks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnloadChecks")
            .field("len", &self.len())
            .finish()
    }
}

impl UnloadChecks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `producer` under `name`, or under a generated `check-<n>` name
    /// when `name` is `None`. An existing check with the same name is replaced.
    /// Returns the name used.
    pub fn set_check<F>(&self, name: Option<&str>, producer: F) -> String
    where
        F: Fn() -> Option<String> + Send + Sync + 'static,
    {
        let mut checks = lock(&self.inner);
        let seq = checks.next_seq;
        checks.next_seq += 1;
        let name = match name {
            Some(n) => n.to_string(),
            None => format!("check-{seq}"),
        };
        checks.entries.insert(
            name.clone(),
            Entry {
                seq,
                producer: Arc::new(producer),
            },
        );
        name
    }

    /// Remove a check. Returns false if no check had that name.
    pub fn remove_check(&self, name: &str) -> bool {
        lock(&self.inner).entries.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        lock(&self.inner).entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every producer (in registration order) and join the non-empty
    /// results with newlines. `None` means there is nothing to warn about.
    pub fn warning_message(&self) -> Option<String> {
        // Producers run without the lock held so they may touch the registry.
        let mut producers: Vec<(u64, Producer)> = lock(&self.inner)
            .entries
            .values()
            .map(|e| (e.seq, Arc::clone(&e.producer)))
            .collect();
        producers.sort_by_key(|(seq, _)| *seq);

        let lines: Vec<String> = producers
            .into_iter()
            .filter_map(|(_, producer)| producer())
            .filter(|text| !text.is_empty())
            .collect();
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }
}

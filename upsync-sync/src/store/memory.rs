//! In-memory object store.
//!
//! Objects live in a `BTreeMap` behind a `std::sync::Mutex` that is never held
//! across an `.await`. Every call is recorded so tests can assert on what the
//! engine did, and individual operations can be made to fail.
//!
//! The store also serves its own objects over [`ManifestFetcher`], resolving
//! the URLs produced by [`ObjectStore::public_url`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{FetchError, StoreError};
use crate::manifest::with_scheme;
use crate::ports::{Content, DeleteOutcome, ManifestFetcher, ObjectStore};

const DEFAULT_DOMAIN: &str = "http://memory.test";

#[derive(Default)]
struct State {
    objects: BTreeMap<String, Vec<u8>>,
    puts: Vec<String>,
    delete_calls: Vec<Vec<String>>,
    fetches: Vec<String>,
    failing_puts: BTreeSet<String>,
    rejected_deletes: BTreeSet<String>,
    fail_deletes: bool,
    fail_fetches: bool,
    put_delay: Option<Duration>,
    puts_in_flight: usize,
    peak_puts_in_flight: usize,
}

pub struct MemoryStore {
    domain: String,
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_domain(DEFAULT_DOMAIN)
    }

    /// Store whose public URLs start with `domain` (may be protocol-relative).
    pub fn with_domain(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- seeding and inspection ---------------------------------------------

    pub fn insert(&self, key: &str, bytes: Vec<u8>) {
        self.state().objects.insert(key.to_string(), bytes);
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.state().objects.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state().objects.contains_key(key)
    }

    /// Keys of every successful `put`, in completion order.
    pub fn put_log(&self) -> Vec<String> {
        self.state().puts.clone()
    }

    /// Key lists of every `batch_delete` call, including failed ones.
    pub fn delete_calls(&self) -> Vec<Vec<String>> {
        self.state().delete_calls.clone()
    }

    /// URLs requested through [`ManifestFetcher::get`].
    pub fn fetch_log(&self) -> Vec<String> {
        self.state().fetches.clone()
    }

    /// Highest number of `put` calls observed running at the same time.
    pub fn peak_puts_in_flight(&self) -> usize {
        self.state().peak_puts_in_flight
    }

    pub fn puts_in_flight(&self) -> usize {
        self.state().puts_in_flight
    }

    // -- failure injection --------------------------------------------------

    pub fn fail_put_for(&self, key: &str) {
        self.state().failing_puts.insert(key.to_string());
    }

    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.failing_puts.clear();
        state.rejected_deletes.clear();
        state.fail_deletes = false;
        state.fail_fetches = false;
    }

    /// Make every `batch_delete` request fail as a whole.
    pub fn fail_deletes(&self) {
        self.state().fail_deletes = true;
    }

    /// Make `batch_delete` report a per-key failure for `key`.
    pub fn reject_delete_of(&self, key: &str) {
        self.state().rejected_deletes.insert(key.to_string());
    }

    pub fn fail_fetches(&self) {
        self.state().fail_fetches = true;
    }

    /// Simulated latency of every `put`.
    pub fn set_put_delay(&self, delay: Duration) {
        self.state().put_delay = Some(delay);
    }

    pub fn clear_put_delay(&self) {
        self.state().put_delay = None;
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        let without_query = url.split('?').next().unwrap_or(url);
        let domain = self.domain.trim_end_matches('/');
        without_query
            .strip_prefix(domain)
            .or_else(|| without_query.strip_prefix(with_scheme(domain).as_str()))
            .map(|rest| rest.trim_start_matches('/').to_string())
    }
}

/// Counts a put as in flight until it completes or its future is dropped.
struct InFlight<'a>(&'a MemoryStore);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.0.state();
        state.puts_in_flight = state.puts_in_flight.saturating_sub(1);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, key: &str, content: Content) -> Result<(), StoreError> {
        let delay = {
            let mut state = self.state();
            state.puts_in_flight += 1;
            state.peak_puts_in_flight = state.peak_puts_in_flight.max(state.puts_in_flight);
            state.put_delay
        };
        let _in_flight = InFlight(self);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let bytes = content.into_bytes().await?;

        let mut state = self.state();
        if state.failing_puts.contains(key) {
            return Err(StoreError::Rejected(format!("injected put failure for {key}")));
        }
        state.objects.insert(key.to_string(), bytes);
        state.puts.push(key.to_string());
        Ok(())
    }

    async fn batch_delete(&self, keys: &[String]) -> Result<Vec<DeleteOutcome>, StoreError> {
        let mut state = self.state();
        state.delete_calls.push(keys.to_vec());
        if state.fail_deletes {
            return Err(StoreError::Rejected("injected batch delete failure".into()));
        }
        let outcomes = keys
            .iter()
            .map(|key| {
                if state.rejected_deletes.contains(key) {
                    return DeleteOutcome::failed(
                        key,
                        StoreError::Rejected(format!("injected delete failure for {key}")),
                    );
                }
                match state.objects.remove(key) {
                    Some(_) => DeleteOutcome::deleted(key),
                    None => DeleteOutcome::failed(key, StoreError::NotFound { key: key.clone() }),
                }
            })
            .collect::<Vec<_>>();
        Ok(outcomes)
    }

    fn public_url(&self, key: &str) -> String {
        super::public_url(&self.domain, key)
    }
}

#[async_trait]
impl ManifestFetcher for MemoryStore {
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut state = self.state();
        state.fetches.push(url.to_string());
        if state.fail_fetches {
            return Err(FetchError::Transport {
                url: url.to_string(),
                message: "injected fetch failure".into(),
            });
        }
        self.key_for_url(url)
            .and_then(|key| state.objects.get(&key).cloned())
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                code: 404,
            })
    }
}

//! Test double for the networked server.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use booking_core::storage::{RemoteBackend, Result, Row, StoreError, Value};

use super::embedded::EmbeddedStore;

/// A `RemoteBackend` over an in-memory SQLite database, with switches to
/// simulate network failures.
pub struct FakeRemote {
    store: EmbeddedStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self {
            store: EmbeddedStore::in_memory().expect("in-memory database"),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// Writes straight to the server, as another process would.
    pub fn seed(&self, query: &str, params: &[Value]) {
        self.store.run(query, params).expect("seed statement");
    }

    /// Reads straight from the server.
    pub fn authoritative(&self, query: &str) -> Vec<Row> {
        self.store.query(query, &[]).expect("authoritative read")
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteBackend for FakeRemote {
    async fn execute(&self, query: &str, params: &[Value]) -> Result<u64> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Connectivity("connection reset".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.store.run(query, params)
    }

    async fn fetch_all(&self, query: &str, params: &[Value]) -> Result<Vec<Row>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Connectivity("connection reset".to_string()));
        }
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.store.query(query, params)
    }
}

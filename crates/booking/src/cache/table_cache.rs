//! Per-table row mirror for remote mode.
//!
//! Each tracked table holds its rows behind an `Arc`, so a refresh swaps the
//! whole list in one step and readers holding a snapshot never see it change
//! underneath them. Optimistic mutations copy-on-write through
//! `Arc::make_mut`.
//!
//! Refreshes are ticketed. A refresh that completes after a newer one has
//! already been applied is dropped, so an out-of-order response can never
//! roll the table back. A refresh issued before the latest local write is
//! dropped too: its rows were read before that write and would erase it.
//! Only the refresh the write triggers, issued after the server has seen it,
//! may replace the rows.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use booking_core::storage::{Row, TRACKED_TABLES};

/// Lifecycle of one cached table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Never loaded.
    Empty,
    /// First load in flight.
    Loading,
    /// Matches the server as of the last refresh.
    Fresh,
    /// Holds local writes the server has not been re-read for.
    OptimisticallyMutated,
    /// A reload is in flight after the table was loaded once.
    Refreshing,
}

impl CacheState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheState::Empty => "empty",
            CacheState::Loading => "loading",
            CacheState::Fresh => "fresh",
            CacheState::OptimisticallyMutated => "optimistically_mutated",
            CacheState::Refreshing => "refreshing",
        }
    }
}

/// Identifies one refresh of one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RefreshTicket(u64);

#[derive(Debug)]
struct TableSlot {
    rows: Arc<Vec<Row>>,
    state: CacheState,
    loaded: bool,
    /// Highest ticket handed out.
    issued: u64,
    /// Ticket whose rows are currently held.
    applied: u64,
    /// Highest ticket issued before the latest local write.
    dirty_at: u64,
    /// Holds local writes that no applied refresh has replaced yet.
    mutated: bool,
}

impl TableSlot {
    fn new() -> Self {
        Self {
            rows: Arc::new(Vec::new()),
            state: CacheState::Empty,
            loaded: false,
            issued: 0,
            applied: 0,
            dirty_at: 0,
            mutated: false,
        }
    }
}

/// Summary of one table for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStatus {
    pub table: String,
    pub state: CacheState,
    pub rows: usize,
}

/// In-memory mirror of the tracked tables.
#[derive(Debug)]
pub struct TableCache {
    tables: RwLock<HashMap<String, TableSlot>>,
}

impl TableCache {
    /// Creates an empty cache tracking `tables`.
    pub fn new<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tables = tables
            .into_iter()
            .map(|t| (t.as_ref().to_ascii_lowercase(), TableSlot::new()))
            .collect();
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// A cache over every application table.
    pub fn tracked() -> Self {
        Self::new(TRACKED_TABLES)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, TableSlot>> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, TableSlot>> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_tracked(&self, table: &str) -> bool {
        self.read().contains_key(&table.to_ascii_lowercase())
    }

    /// Tracked table names, sorted.
    pub fn tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// True once the table holds rows worth serving: a load has been applied
    /// or local writes were mirrored into it.
    pub fn is_populated(&self, table: &str) -> bool {
        self.read()
            .get(&table.to_ascii_lowercase())
            .is_some_and(|slot| slot.loaded || slot.mutated)
    }

    pub fn state(&self, table: &str) -> Option<CacheState> {
        self.read()
            .get(&table.to_ascii_lowercase())
            .map(|slot| slot.state)
    }

    /// The rows currently held for `table`.
    pub fn snapshot(&self, table: &str) -> Option<Arc<Vec<Row>>> {
        self.read()
            .get(&table.to_ascii_lowercase())
            .map(|slot| Arc::clone(&slot.rows))
    }

    /// Marks a reload of `table` as started and hands out its ticket.
    pub fn begin_refresh(&self, table: &str) -> Option<RefreshTicket> {
        let mut tables = self.write();
        let slot = tables.get_mut(&table.to_ascii_lowercase())?;
        slot.issued += 1;
        slot.state = if slot.loaded {
            CacheState::Refreshing
        } else {
            CacheState::Loading
        };
        Some(RefreshTicket(slot.issued))
    }

    /// Replaces the rows of `table` with a completed load.
    ///
    /// Returns false, leaving the rows untouched, when a newer load has
    /// already been applied or a local write happened after the load was
    /// issued.
    pub fn complete_refresh(&self, table: &str, ticket: RefreshTicket, rows: Vec<Row>) -> bool {
        let mut tables = self.write();
        let Some(slot) = tables.get_mut(&table.to_ascii_lowercase()) else {
            return false;
        };
        if ticket.0 <= slot.applied {
            return false;
        }
        if ticket.0 <= slot.dirty_at {
            if ticket.0 == slot.issued {
                slot.state = CacheState::OptimisticallyMutated;
            }
            return false;
        }

        slot.rows = Arc::new(rows);
        slot.applied = ticket.0;
        slot.loaded = true;
        slot.mutated = false;
        slot.state = if ticket.0 == slot.issued {
            CacheState::Fresh
        } else {
            CacheState::Refreshing
        };
        true
    }

    /// Records a failed load. The rows held so far stay in place.
    pub fn fail_refresh(&self, table: &str, ticket: RefreshTicket) {
        let mut tables = self.write();
        let Some(slot) = tables.get_mut(&table.to_ascii_lowercase()) else {
            return;
        };
        if ticket.0 != slot.issued {
            return;
        }
        slot.state = if slot.loaded || slot.mutated {
            CacheState::OptimisticallyMutated
        } else {
            CacheState::Empty
        };
    }

    /// Applies a local change to the rows of `table`.
    ///
    /// Loads already in flight were read before the change and will be
    /// dropped when they complete. They keep the table's state until then.
    pub fn mutate<F, R>(&self, table: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut Vec<Row>) -> R,
    {
        let mut tables = self.write();
        let slot = tables.get_mut(&table.to_ascii_lowercase())?;
        let result = f(Arc::make_mut(&mut slot.rows));
        slot.dirty_at = slot.issued;
        slot.mutated = true;
        if matches!(slot.state, CacheState::Empty | CacheState::Fresh) {
            slot.state = CacheState::OptimisticallyMutated;
        }
        Some(result)
    }

    pub fn status(&self) -> Vec<TableStatus> {
        let tables = self.read();
        let mut status: Vec<TableStatus> = tables
            .iter()
            .map(|(table, slot)| TableStatus {
                table: table.clone(),
                state: slot.state,
                rows: slot.rows.len(),
            })
            .collect();
        status.sort_by(|a, b| a.table.cmp(&b.table));
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use booking_core::storage::Value;

    fn rows(ids: &[&str]) -> Vec<Row> {
        ids.iter()
            .map(|id| [("id", Value::from(*id))].into_iter().collect())
            .collect()
    }

    fn ids(cache: &TableCache, table: &str) -> Vec<String> {
        cache
            .snapshot(table)
            .unwrap()
            .iter()
            .map(|r| r.get("id").unwrap().as_text().into_owned())
            .collect()
    }

    #[test]
    fn test_starts_empty() {
        let cache = TableCache::tracked();
        assert_eq!(cache.state("staff"), Some(CacheState::Empty));
        assert!(cache.snapshot("staff").unwrap().is_empty());
        assert_eq!(cache.state("sessions"), None);
        assert!(cache.is_tracked("Appointments"));
    }

    #[test]
    fn test_load_lifecycle() {
        let cache = TableCache::new(["staff"]);

        let ticket = cache.begin_refresh("staff").unwrap();
        assert_eq!(cache.state("staff"), Some(CacheState::Loading));

        assert!(cache.complete_refresh("staff", ticket, rows(&["s1"])));
        assert_eq!(cache.state("staff"), Some(CacheState::Fresh));

        cache.mutate("staff", |rows| rows.clear());
        assert_eq!(cache.state("staff"), Some(CacheState::OptimisticallyMutated));

        let ticket = cache.begin_refresh("staff").unwrap();
        assert_eq!(cache.state("staff"), Some(CacheState::Refreshing));
        assert!(cache.complete_refresh("staff", ticket, rows(&["s1", "s2"])));
        assert_eq!(cache.state("staff"), Some(CacheState::Fresh));
        assert_eq!(ids(&cache, "staff"), vec!["s1", "s2"]);
    }

    #[test]
    fn test_stale_refresh_is_dropped() {
        let cache = TableCache::new(["staff"]);
        let older = cache.begin_refresh("staff").unwrap();
        let newer = cache.begin_refresh("staff").unwrap();

        assert!(cache.complete_refresh("staff", newer, rows(&["new"])));
        assert!(!cache.complete_refresh("staff", older, rows(&["old"])));

        assert_eq!(ids(&cache, "staff"), vec!["new"]);
        assert_eq!(cache.state("staff"), Some(CacheState::Fresh));
    }

    #[test]
    fn test_older_refresh_applies_but_stays_refreshing() {
        let cache = TableCache::new(["staff"]);
        let older = cache.begin_refresh("staff").unwrap();
        let newer = cache.begin_refresh("staff").unwrap();

        assert!(cache.complete_refresh("staff", older, rows(&["old"])));
        assert_eq!(cache.state("staff"), Some(CacheState::Refreshing));

        assert!(cache.complete_refresh("staff", newer, rows(&["new"])));
        assert_eq!(cache.state("staff"), Some(CacheState::Fresh));
    }

    #[test]
    fn test_refresh_issued_before_a_write_is_dropped() {
        let cache = TableCache::new(["staff"]);
        let ticket = cache.begin_refresh("staff").unwrap();
        cache.complete_refresh("staff", ticket, rows(&["s1"]));

        let in_flight = cache.begin_refresh("staff").unwrap();
        cache.mutate("staff", |rows| rows.push(rows[0].clone()));
        assert_eq!(cache.state("staff"), Some(CacheState::Refreshing));

        assert!(!cache.complete_refresh("staff", in_flight, rows(&["s1"])));
        assert_eq!(cache.snapshot("staff").unwrap().len(), 2);
        assert_eq!(cache.state("staff"), Some(CacheState::OptimisticallyMutated));

        let after_write = cache.begin_refresh("staff").unwrap();
        assert!(cache.complete_refresh("staff", after_write, rows(&["s1", "s2"])));
        assert_eq!(ids(&cache, "staff"), vec!["s1", "s2"]);
        assert_eq!(cache.state("staff"), Some(CacheState::Fresh));
    }

    #[test]
    fn test_populated_after_load_or_write() {
        let cache = TableCache::new(["staff", "services"]);
        assert!(!cache.is_populated("staff"));

        let ticket = cache.begin_refresh("staff").unwrap();
        assert!(!cache.is_populated("staff"));
        cache.complete_refresh("staff", ticket, Vec::new());
        assert!(cache.is_populated("staff"));

        cache.mutate("services", |rows| rows.extend(self::rows(&["sv1"])));
        assert!(cache.is_populated("services"));
        assert!(!cache.is_populated("sessions"));
    }

    #[test]
    fn test_failed_refresh_keeps_rows() {
        let cache = TableCache::new(["staff"]);
        let ticket = cache.begin_refresh("staff").unwrap();
        cache.complete_refresh("staff", ticket, rows(&["s1"]));

        let ticket = cache.begin_refresh("staff").unwrap();
        cache.fail_refresh("staff", ticket);

        assert_eq!(ids(&cache, "staff"), vec!["s1"]);
        assert_eq!(cache.state("staff"), Some(CacheState::OptimisticallyMutated));
    }

    #[test]
    fn test_failed_first_load_returns_to_empty() {
        let cache = TableCache::new(["staff"]);
        let ticket = cache.begin_refresh("staff").unwrap();
        cache.fail_refresh("staff", ticket);
        assert_eq!(cache.state("staff"), Some(CacheState::Empty));
    }

    #[test]
    fn test_snapshots_are_isolated_from_mutation() {
        let cache = TableCache::new(["staff"]);
        let ticket = cache.begin_refresh("staff").unwrap();
        cache.complete_refresh("staff", ticket, rows(&["s1"]));

        let before = cache.snapshot("staff").unwrap();
        cache.mutate("staff", |rows| rows.push(rows[0].clone()));

        assert_eq!(before.len(), 1);
        assert_eq!(cache.snapshot("staff").unwrap().len(), 2);
    }

    #[test]
    fn test_untracked_tables_are_ignored() {
        let cache = TableCache::new(["staff"]);
        assert!(cache.begin_refresh("sessions").is_none());
        assert!(cache.mutate("sessions", |_| ()).is_none());
        assert_eq!(cache.tables(), vec!["staff"]);
    }

    #[test]
    fn test_status_reports_every_table() {
        let cache = TableCache::new(["staff", "appointments"]);
        let ticket = cache.begin_refresh("staff").unwrap();
        cache.complete_refresh("staff", ticket, rows(&["s1", "s2"]));

        let status = cache.status();
        assert_eq!(status.len(), 2);
        assert_eq!(status[0].table, "appointments");
        assert_eq!(status[0].state, CacheState::Empty);
        assert_eq!(status[1].rows, 2);
        assert_eq!(status[1].state.as_str(), "fresh");
    }
}

//! In-memory AggregateStore for tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use seller_common::DailyAggregate;

use crate::error::{Result, StoreError};
use crate::store::{AggregateStore, Fold};

/// Keeps live rows by date plus soft-deleted rows, and counts writes.
/// Reads and writes can be made to fail independently.
pub struct MemoryAggregateStore<A> {
    live: Mutex<BTreeMap<NaiveDate, A>>,
    deleted: Mutex<Vec<A>>,
    next_id: AtomicUsize,
    creates: AtomicUsize,
    updates: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl<A> Default for MemoryAggregateStore<A> {
    fn default() -> Self {
        Self {
            live: Mutex::new(BTreeMap::new()),
            deleted: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
            creates: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }
}

impl<A: DailyAggregate> MemoryAggregateStore<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Live rows in date order.
    pub fn rows(&self) -> Vec<A> {
        self.live.lock().unwrap().values().cloned().collect()
    }

    pub fn deleted_rows(&self) -> Vec<A> {
        self.deleted.lock().unwrap().clone()
    }

    fn check(&self, flag: &AtomicBool, op: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("{op} disabled")));
        }
        Ok(())
    }
}

#[async_trait]
impl<A: DailyAggregate> AggregateStore<A> for MemoryAggregateStore<A> {
    async fn get_by_date(&self, date: NaiveDate) -> Result<Option<A>> {
        self.check(&self.fail_reads, "read")?;
        Ok(self.live.lock().unwrap().get(&date).cloned())
    }

    async fn create(&self, aggregate: &A) -> Result<A> {
        self.check(&self.fail_writes, "write")?;
        let mut live = self.live.lock().unwrap();
        let date = aggregate.date();
        if live.contains_key(&date) {
            return Err(StoreError::DuplicateDate(date));
        }

        let mut row = aggregate.clone();
        row.set_id(self.next_id.fetch_add(1, Ordering::SeqCst) as i64);
        live.insert(date, row.clone());
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(row)
    }

    async fn update(&self, aggregate: &A) -> Result<A> {
        self.check(&self.fail_writes, "write")?;
        let mut live = self.live.lock().unwrap();
        let date = aggregate.date();
        let existing = live.get_mut(&date).ok_or(StoreError::NotFound(date))?;

        let id = existing.id();
        *existing = aggregate.clone();
        if let Some(id) = id {
            existing.set_id(id);
        }
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(existing.clone())
    }

    async fn fold_by_date<'a>(&self, date: NaiveDate, fold: Fold<'a, A>) -> Result<A> {
        self.check(&self.fail_reads, "read")?;
        self.check(&self.fail_writes, "write")?;
        let mut live = self.live.lock().unwrap();

        let existing = live.get(&date).cloned();
        let mut row = existing.clone().unwrap_or_else(|| A::zero(date));
        fold(&mut row)?;

        match existing {
            Some(_) => {
                self.updates.fetch_add(1, Ordering::SeqCst);
            }
            None => {
                row.set_id(self.next_id.fetch_add(1, Ordering::SeqCst) as i64);
                self.creates.fetch_add(1, Ordering::SeqCst);
            }
        }
        live.insert(date, row.clone());
        Ok(row)
    }

    async fn soft_delete(&self, date: NaiveDate) -> Result<bool> {
        self.check(&self.fail_writes, "write")?;
        let removed = self.live.lock().unwrap().remove(&date);
        match removed {
            Some(row) => {
                self.deleted.lock().unwrap().push(row);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

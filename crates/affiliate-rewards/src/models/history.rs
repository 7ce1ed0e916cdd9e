use crate::error::{Error, Result};

/// A payload recorded at a block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<T> {
    pub block_number: u64,
    pub payload: T,
}

/// Block indexed snapshots where blocks without a snapshot resolve to the latest earlier one.
///
/// Contracts only emit logs when their state changes, so most blocks in a reward window have no
/// entry of their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseHistory<T> {
    snapshots: Vec<Snapshot<T>>,
}

impl<T> Default for SparseHistory<T> {
    fn default() -> Self {
        Self {
            snapshots: Vec::new(),
        }
    }
}

impl<T> SparseHistory<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert keeping ascending block order; equal blocks insert before existing entries
    pub fn insert(&mut self, block_number: u64, payload: T) {
        let index = self
            .snapshots
            .partition_point(|snapshot| snapshot.block_number < block_number);
        self.snapshots.insert(
            index,
            Snapshot {
                block_number,
                payload,
            },
        );
    }

    /// Latest snapshot at or before `block_number`. Among duplicates of that block the most
    /// recent insert wins, same as [`get`](Self::get).
    pub fn lookup(&self, block_number: u64) -> Result<&Snapshot<T>> {
        let first = self.snapshots.first().ok_or(Error::HistoryEmpty)?;
        let end = self
            .snapshots
            .partition_point(|snapshot| snapshot.block_number <= block_number);
        if end == 0 {
            return Err(Error::HistoryTooEarly {
                requested: block_number,
                first: first.block_number,
            });
        }
        let found = self.snapshots[end - 1].block_number;
        let index = self
            .snapshots
            .partition_point(|snapshot| snapshot.block_number < found);
        Ok(&self.snapshots[index])
    }

    /// Snapshot recorded exactly at `block_number`
    pub fn get(&self, block_number: u64) -> Result<&Snapshot<T>> {
        let index = self
            .snapshots
            .partition_point(|snapshot| snapshot.block_number < block_number);
        match self.snapshots.get(index) {
            Some(snapshot) if snapshot.block_number == block_number => Ok(snapshot),
            _ => Err(Error::HistoryNotFound(block_number)),
        }
    }

    pub fn has(&self, block_number: u64) -> bool {
        self.get(block_number).is_ok()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot<T>> {
        self.snapshots.iter()
    }
}

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Generic row table with exclusive write-back handles.
//!
//! Rows are fetched into a [`Handle`] that owns the row for its scope and
//! writes it back on drop. Two disjoint dirty bits separate cheap column
//! updates from full payload rewrites; the table keeps its secondary
//! indexes (flag columns, position) in sync on every write-back so the
//! per-block phases can query "all moving characters" or "fighters at
//! tile" without touching every row.
//!
//! Checking out a row that is already checked out is a consistency bug:
//! drop order would decide which write wins. The table detects it and
//! aborts with a diagnostic instead of letting state diverge.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::ops::Deref;

use hexar_geom::Hex;

/// Flag-column bit assignments shared by all tables.
pub mod columns {
    /// Row has a non-empty movement queue.
    pub const MOVING: u8 = 1;
    /// Row has an acquired hostile or friendly target.
    pub const HAS_TARGET: u8 = 1 << 1;
    /// Row regenerates shield and is below its cap.
    pub const CAN_REGEN: u8 = 1 << 2;
    /// Row is busy with an ongoing operation.
    pub const BUSY: u8 = 1 << 3;
    /// Row is actively mining.
    pub const MINING: u8 = 1 << 4;
    /// Row can attack (has at least one attack fitted).
    pub const ARMED: u8 = 1 << 5;
}

const COLUMN_COUNT: usize = 6;

/// A row storable in a [`Table`].
pub trait TableRow: Clone + Debug {
    /// Primary key type.
    type Key: Ord + Clone + Debug;

    /// The row's primary key.
    fn key(&self) -> Self::Key;

    /// Current flag-column bitmask; see [`columns`].
    fn columns(&self) -> u8 {
        0
    }

    /// Position index key, if the row is on the map.
    fn position_key(&self) -> Option<Hex> {
        None
    }
}

#[derive(Debug)]
struct Inner<R: TableRow> {
    /// `None` marks a row currently checked out into a handle.
    rows: BTreeMap<R::Key, Option<R>>,
    flags: [BTreeSet<R::Key>; COLUMN_COUNT],
    by_pos: BTreeMap<Hex, BTreeSet<R::Key>>,
    checked_out: usize,
    column_writes: u64,
    payload_writes: u64,
}

impl<R: TableRow> Inner<R> {
    fn index_insert(&mut self, row: &R) {
        let cols = row.columns();
        for (bit, set) in self.flags.iter_mut().enumerate() {
            if cols & (1 << bit) != 0 {
                set.insert(row.key());
            }
        }
        if let Some(pos) = row.position_key() {
            self.by_pos.entry(pos).or_default().insert(row.key());
        }
    }

    fn index_remove(&mut self, key: &R::Key, cols: u8, pos: Option<Hex>) {
        for (bit, set) in self.flags.iter_mut().enumerate() {
            if cols & (1 << bit) != 0 {
                set.remove(key);
            }
        }
        if let Some(p) = pos {
            if let Some(set) = self.by_pos.get_mut(&p) {
                set.remove(key);
                if set.is_empty() {
                    self.by_pos.remove(&p);
                }
            }
        }
    }
}

/// A persistent entity collection with exclusive row handles.
#[derive(Debug)]
pub struct Table<R: TableRow> {
    inner: RefCell<Inner<R>>,
}

impl<R: TableRow> Default for Table<R> {
    fn default() -> Self {
        Self {
            inner: RefCell::new(Inner {
                rows: BTreeMap::new(),
                flags: std::array::from_fn(|_| BTreeSet::new()),
                by_pos: BTreeMap::new(),
                checked_out: 0,
                column_writes: 0,
                payload_writes: 0,
            }),
        }
    }
}

impl<R: TableRow> Table<R> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a fresh row. The key must be unused.
    pub fn insert(&self, row: R) {
        let mut inner = self.inner.borrow_mut();
        let key = row.key();
        assert!(
            !inner.rows.contains_key(&key),
            "duplicate row key {key:?} inserted"
        );
        inner.index_insert(&row);
        inner.rows.insert(key, Some(row));
    }

    /// Checks the row out into an exclusive handle, or `None` if absent.
    ///
    /// Aborts if the row is already checked out: two live handles to one
    /// row would make persisted state depend on drop order.
    pub fn checkout(&self, key: &R::Key) -> Option<Handle<'_, R>> {
        let mut inner = self.inner.borrow_mut();
        let slot = inner.rows.get_mut(key)?;
        let row = slot
            .take()
            .unwrap_or_else(|| panic!("row {key:?} is already checked out"));
        inner.checked_out += 1;
        let old_columns = row.columns();
        let old_pos = row.position_key();
        Some(Handle {
            table: self,
            row: Some(row),
            old_columns,
            old_pos,
            dirty_columns: false,
            dirty_payload: false,
            deleted: false,
        })
    }

    /// Reads a row without checking it out.
    pub fn read<T>(&self, key: &R::Key, f: impl FnOnce(&R) -> T) -> Option<T> {
        let inner = self.inner.borrow();
        let slot = inner.rows.get(key)?;
        let row = slot
            .as_ref()
            .unwrap_or_else(|| panic!("row {key:?} is checked out"));
        Some(f(row))
    }

    /// Whether a row with `key` exists.
    #[must_use]
    pub fn contains(&self, key: &R::Key) -> bool {
        self.inner.borrow().rows.contains_key(key)
    }

    /// All keys in ascending order.
    #[must_use]
    pub fn keys(&self) -> Vec<R::Key> {
        self.inner.borrow().rows.keys().cloned().collect()
    }

    /// Keys of rows whose flag columns contain every bit of `mask`,
    /// ascending.
    #[must_use]
    pub fn keys_with(&self, mask: u8) -> Vec<R::Key> {
        let inner = self.inner.borrow();
        let mut sets: Vec<&BTreeSet<R::Key>> = Vec::new();
        for (bit, set) in inner.flags.iter().enumerate() {
            if mask & (1 << bit) != 0 {
                sets.push(set);
            }
        }
        match sets.split_first() {
            None => inner.rows.keys().cloned().collect(),
            Some((first, rest)) => first
                .iter()
                .filter(|k| rest.iter().all(|s| s.contains(k)))
                .cloned()
                .collect(),
        }
    }

    /// Keys of rows indexed at `pos`, ascending.
    #[must_use]
    pub fn keys_at(&self, pos: Hex) -> Vec<R::Key> {
        self.inner
            .borrow()
            .by_pos
            .get(&pos)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().rows.len()
    }

    /// Whether the table holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().rows.is_empty()
    }

    /// Clones every row, in key order. Aborts if any row is checked out.
    #[must_use]
    pub fn snapshot(&self) -> Vec<R> {
        let inner = self.inner.borrow();
        assert_eq!(
            inner.checked_out, 0,
            "snapshot taken while rows are checked out"
        );
        inner
            .rows
            .values()
            .map(|slot| match slot {
                Some(r) => r.clone(),
                None => unreachable!("checked_out was zero"),
            })
            .collect()
    }

    /// `(column_writes, payload_writes)` counters since construction.
    #[must_use]
    pub fn write_stats(&self) -> (u64, u64) {
        let inner = self.inner.borrow();
        (inner.column_writes, inner.payload_writes)
    }

    fn give_back(
        &self,
        row: R,
        old_columns: u8,
        old_pos: Option<Hex>,
        dirty_columns: bool,
        dirty_payload: bool,
        deleted: bool,
    ) {
        let mut inner = self.inner.borrow_mut();
        inner.checked_out -= 1;
        let key = row.key();
        if deleted {
            inner.index_remove(&key, old_columns, old_pos);
            inner.rows.remove(&key);
            return;
        }
        if dirty_columns || dirty_payload {
            inner.index_remove(&key, old_columns, old_pos);
            inner.index_insert(&row);
        }
        if dirty_payload {
            inner.payload_writes += 1;
        } else if dirty_columns {
            inner.column_writes += 1;
        }
        inner.rows.insert(key, Some(row));
    }
}

impl<R: TableRow> Clone for Table<R> {
    /// Deep-copies the table for the per-block transaction boundary.
    ///
    /// Aborts if any row is checked out; cloning mid-mutation would
    /// silently fork state.
    fn clone(&self) -> Self {
        let inner = self.inner.borrow();
        assert_eq!(
            inner.checked_out, 0,
            "table cloned while rows are checked out"
        );
        Self {
            inner: RefCell::new(Inner {
                rows: inner.rows.clone(),
                flags: inner.flags.clone(),
                by_pos: inner.by_pos.clone(),
                checked_out: 0,
                column_writes: inner.column_writes,
                payload_writes: inner.payload_writes,
            }),
        }
    }
}

/// Exclusive lease on one row; writes back on drop.
#[derive(Debug)]
pub struct Handle<'t, R: TableRow> {
    table: &'t Table<R>,
    row: Option<R>,
    old_columns: u8,
    old_pos: Option<Hex>,
    dirty_columns: bool,
    dirty_payload: bool,
    deleted: bool,
}

impl<R: TableRow> Handle<'_, R> {
    /// Mutable row access for cheap indexed-column fields only.
    ///
    /// Marks the column dirty bit; the write-back updates indexes but is
    /// counted as a cheap update rather than a payload rewrite.
    pub fn columns_mut(&mut self) -> &mut R {
        self.dirty_columns = true;
        match &mut self.row {
            Some(r) => r,
            None => unreachable!("row taken before drop"),
        }
    }

    /// Mutable access to the full payload; marks the payload dirty bit.
    pub fn payload_mut(&mut self) -> &mut R {
        self.dirty_payload = true;
        match &mut self.row {
            Some(r) => r,
            None => unreachable!("row taken before drop"),
        }
    }

    /// Deletes the row on drop.
    pub fn delete(mut self) {
        self.deleted = true;
    }
}

impl<R: TableRow> Deref for Handle<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        match &self.row {
            Some(r) => r,
            None => unreachable!("row taken before drop"),
        }
    }
}

impl<R: TableRow> Drop for Handle<'_, R> {
    fn drop(&mut self) {
        if let Some(row) = self.row.take() {
            self.table.give_back(
                row,
                self.old_columns,
                self.old_pos,
                self.dirty_columns,
                self.dirty_payload,
                self.deleted,
            );
        }
    }
}

//! Persistent storage collaborator.
//!
//! Tables are stored as rows of coordinates (one item per table coordinate, in coordinate
//! order) and an optional value. The [Storage] trait is what the model and the convergence loop
//! talk to; [MemoryStore] is an in-process implementation that can be persisted as JSON.

mod memory;
mod snapshot;

pub use memory::MemoryStore;
pub use snapshot::Snapshot;

use std::collections::BTreeMap;
use std::sync::Arc;
use parking_lot::RwLock;
use serde::{Deserialize,Serialize};

use crate::error::Result;

/// Row filter: dimension -> accepted items. Dimensions not named are not restricted.
pub type Filter = BTreeMap<String,Vec<String>>;

#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct Row {
    pub coords : Vec<String>,
    pub value  : Option<f64>,
}

impl Row {
    pub fn new<S : AsRef<str>>(coords : &[S], value : Option<f64>) -> Row {
        Row{ coords : coords.iter().map(|s| s.as_ref().to_string()).collect(), value }
    }
}

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum WriteMode {
    /// Add rows; a row whose coordinates already exist is an error
    Insert,
    /// Add rows, overwriting the values of rows with the same coordinates
    Replace,
}

pub trait Storage {
    /// Create an empty table. Creating an existing table with the same coordinates is a no-op.
    fn create_table(& mut self, table : &str, coordinates : &[String]) -> Result<()>;
    /// Coordinate dimensions of a table.
    fn coordinates(&self, table : &str) -> Result<Vec<String>>;
    fn get_rows(&self, table : &str, filter : &Filter) -> Result<Vec<Row>>;
    fn put_rows(& mut self, table : &str, rows : Vec<Row>, mode : WriteMode) -> Result<()>;
    fn list_tables(&self) -> Vec<String>;
    fn list_dimension_items(&self, dimension : &str) -> Result<Vec<String>>;
    /// Store the items of a dimension, replacing earlier ones.
    fn put_dimension_items(& mut self, dimension : &str, items : &[String]) -> Result<()>;

    /// Copy the current rows of `tables`.
    fn snapshot(&self, tables : &[String]) -> Result<Snapshot> {
        let mut data = BTreeMap::new();
        for t in tables {
            data.insert(t.clone(), self.get_rows(t, &Filter::new())?);
        }
        Ok(Snapshot::new(data))
    }
}

/// A store shared between threads. Reads take a shared lock, writes an exclusive one.
pub struct SharedStorage<S> {
    inner : Arc<RwLock<S>>,
}

impl<S> Clone for SharedStorage<S> {
    fn clone(&self) -> Self { SharedStorage{ inner : self.inner.clone() } }
}

impl<S : Storage> SharedStorage<S> {
    pub fn new(store : S) -> SharedStorage<S> { SharedStorage{ inner : Arc::new(RwLock::new(store)) } }
    pub fn read(&self) -> parking_lot::RwLockReadGuard<'_,S> { self.inner.read() }
    pub fn write(&self) -> parking_lot::RwLockWriteGuard<'_,S> { self.inner.write() }
}

impl<S : Storage> Storage for SharedStorage<S> {
    fn create_table(& mut self, table : &str, coordinates : &[String]) -> Result<()> { self.inner.write().create_table(table,coordinates) }
    fn coordinates(&self, table : &str) -> Result<Vec<String>> { self.inner.read().coordinates(table) }
    fn get_rows(&self, table : &str, filter : &Filter) -> Result<Vec<Row>> { self.inner.read().get_rows(table,filter) }
    fn put_rows(& mut self, table : &str, rows : Vec<Row>, mode : WriteMode) -> Result<()> { self.inner.write().put_rows(table,rows,mode) }
    fn list_tables(&self) -> Vec<String> { self.inner.read().list_tables() }
    fn list_dimension_items(&self, dimension : &str) -> Result<Vec<String>> { self.inner.read().list_dimension_items(dimension) }
    fn put_dimension_items(& mut self, dimension : &str, items : &[String]) -> Result<()> { self.inner.write().put_dimension_items(dimension,items) }
    fn snapshot(&self, tables : &[String]) -> Result<Snapshot> { self.inner.read().snapshot(tables) }
}

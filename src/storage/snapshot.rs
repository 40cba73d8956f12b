use std::collections::BTreeMap;
use tracing::{debug,warn};

use super::Row;

/// Copy of table rows taken at the start of an iteration. The copy is released when the
/// snapshot is dropped, on every exit path; dropping it without calling [Snapshot::release]
/// means the iteration was abandoned.
pub struct Snapshot {
    tables   : BTreeMap<String,Vec<Row>>,
    released : bool,
}

impl Snapshot {
    pub fn new(tables : BTreeMap<String,Vec<Row>>) -> Snapshot {
        debug!(tables = tables.len(), "snapshot taken");
        Snapshot{ tables, released : false }
    }

    pub fn rows(&self, table : &str) -> Option<&[Row]> { self.tables.get(table).map(|v| v.as_slice()) }

    pub fn tables(&self) -> impl Iterator<Item = &str> { self.tables.keys().map(|s| s.as_str()) }

    /// Mark the iteration as completed and drop the copy.
    pub fn release(mut self) {
        self.released = true;
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        if ! self.released {
            warn!(tables = self.tables.len(), "snapshot dropped before the iteration completed");
        }
        else {
            debug!(tables = self.tables.len(), "snapshot released");
        }
    }
}

use std::collections::{BTreeMap,HashMap};
use std::path::Path;
use serde::{Deserialize,Serialize};
use tracing::debug;

use crate::error::{ModelError,Result};
use super::{Filter,Row,Storage,WriteMode};

#[derive(Debug,Clone,Default,PartialEq,Serialize,Deserialize)]
struct StoredTable {
    coordinates : Vec<String>,
    rows        : Vec<Row>,
}

/// In-process table store. The whole store can be saved to and loaded from a JSON file.
#[derive(Debug,Clone,Default,PartialEq,Serialize,Deserialize)]
pub struct MemoryStore {
    tables     : BTreeMap<String,StoredTable>,
    dimensions : BTreeMap<String,Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore { Default::default() }

    /// Register the items of a dimension.
    pub fn insert_dimension<S : AsRef<str>>(& mut self, id : &str, items : &[S]) {
        self.dimensions.insert(id.to_string(), items.iter().map(|s| s.as_ref().to_string()).collect());
    }

    pub fn load<P : AsRef<Path>>(path : P) -> Result<MemoryStore> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| ModelError::Io{ context : format!("reading store {}",path.display()), source })?;
        let store = serde_json::from_str(&text)?;
        debug!(path = %path.display(), "store loaded");
        Ok(store)
    }

    pub fn save<P : AsRef<Path>>(&self, path : P) -> Result<()> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)
            .map_err(|source| ModelError::Io{ context : format!("writing store {}",path.display()), source })?;
        debug!(path = %path.display(), "store saved");
        Ok(())
    }

    fn table(&self, table : &str) -> Result<&StoredTable> {
        self.tables.get(table).ok_or_else(|| ModelError::missing(format!("Table '{}' not found in storage",table)))
    }
}

impl Storage for MemoryStore {
    fn create_table(& mut self, table : &str, coordinates : &[String]) -> Result<()> {
        if let Some(t) = self.tables.get(table) {
            if t.coordinates != coordinates {
                return Err(ModelError::Storage(format!("Table '{}' exists with coordinates {:?}",table,t.coordinates)));
            }
            return Ok(());
        }
        self.tables.insert(table.to_string(), StoredTable{ coordinates : coordinates.to_vec(), rows : Vec::new() });
        Ok(())
    }

    fn coordinates(&self, table : &str) -> Result<Vec<String>> {
        Ok(self.table(table)?.coordinates.clone())
    }

    fn get_rows(&self, table : &str, filter : &Filter) -> Result<Vec<Row>> {
        let t = self.table(table)?;
        let mut cols = Vec::with_capacity(filter.len());
        for (d,items) in filter.iter() {
            let i = t.coordinates.iter().position(|c| c == d)
                .ok_or_else(|| ModelError::Storage(format!("Table '{}' has no coordinate '{}'",table,d)))?;
            cols.push((i,items));
        }
        Ok(t.rows.iter()
            .filter(|r| cols.iter().all(|(i,items)| items.contains(&r.coords[*i])))
            .cloned()
            .collect())
    }

    fn put_rows(& mut self, table : &str, rows : Vec<Row>, mode : WriteMode) -> Result<()> {
        let t = self.tables.get_mut(table).ok_or_else(|| ModelError::missing(format!("Table '{}' not found in storage",table)))?;
        if let Some(r) = rows.iter().find(|r| r.coords.len() != t.coordinates.len()) {
            return Err(ModelError::Storage(format!("Row {:?} does not match coordinates {:?} of '{}'",r.coords,t.coordinates,table)));
        }
        let mut index : HashMap<Vec<String>,usize> = t.rows.iter().enumerate().map(|(i,r)| (r.coords.clone(),i)).collect();
        for r in rows {
            let existing = index.get(&r.coords).copied();
            match (existing,mode) {
                (Some(_),WriteMode::Insert) =>
                    return Err(ModelError::Storage(format!("Row {:?} already exists in '{}'",r.coords,table))),
                (Some(i),WriteMode::Replace) => t.rows[i].value = r.value,
                (None,_) => {
                    index.insert(r.coords.clone(), t.rows.len());
                    t.rows.push(r);
                }
            }
        }
        Ok(())
    }

    fn list_tables(&self) -> Vec<String> { self.tables.keys().cloned().collect() }

    fn list_dimension_items(&self, dimension : &str) -> Result<Vec<String>> {
        self.dimensions.get(dimension)
            .cloned()
            .ok_or_else(|| ModelError::missing(format!("Dimension '{}' not found in storage",dimension)))
    }

    fn put_dimension_items(& mut self, dimension : &str, items : &[String]) -> Result<()> {
        self.insert_dimension(dimension, items);
        Ok(())
    }
}

//! Named dimensions ("sets") and the registry holding them.

use std::collections::{BTreeMap,HashMap};
use std::fmt;
use itertools::Itertools;

use crate::error::{ModelError,Result};

/// Restriction applied to the items of a dimension when it is used as a variable coordinate.
#[derive(Debug,Clone,Default,PartialEq)]
pub struct ItemFilter {
    /// Keep only items of this category
    pub category : Option<String>,
    /// Filter name -> accepted values
    pub values   : BTreeMap<String,Vec<String>>,
}

impl ItemFilter {
    pub fn is_empty(&self) -> bool { self.category.is_none() && self.values.is_empty() }
}

/// A named, ordered list of items.
#[derive(Debug,Clone,PartialEq)]
pub struct Dimension {
    pub id             : String,
    pub table_name     : String,
    pub items          : Vec<String>,
    pub splits_problem : bool,
    /// item -> category
    pub categories     : BTreeMap<String,String>,
    /// item -> parent item in another dimension
    pub aggregation    : BTreeMap<String,String>,
    /// filter name -> (item -> value)
    pub filters        : BTreeMap<String,BTreeMap<String,String>>,
}

impl Dimension {
    pub fn new(id : &str, items : &[&str]) -> Dimension {
        Dimension{
            id             : id.to_string(),
            table_name     : format!("_set_{}",id),
            items          : items.iter().map(|s| s.to_string()).collect(),
            splits_problem : false,
            categories     : BTreeMap::new(),
            aggregation    : BTreeMap::new(),
            filters        : BTreeMap::new(),
        }
    }

    pub fn splitting(mut self) -> Dimension { self.splits_problem = true; self }
    pub fn with_categories(mut self, cats : &[(&str,&str)]) -> Dimension {
        self.categories = cats.iter().map(|(i,c)| (i.to_string(),c.to_string())).collect(); self
    }
    pub fn with_aggregation(mut self, agg : &[(&str,&str)]) -> Dimension {
        self.aggregation = agg.iter().map(|(i,p)| (i.to_string(),p.to_string())).collect(); self
    }
    pub fn with_filter(mut self, name : &str, values : &[(&str,&str)]) -> Dimension {
        self.filters.insert(name.to_string(), values.iter().map(|(i,v)| (i.to_string(),v.to_string())).collect()); self
    }

    pub fn len(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn position(&self, item : &str) -> Option<usize> { self.items.iter().position(|i| i == item) }

    /// Return the items that pass `filter`, in dimension order.
    pub fn filtered_items(&self, filter : &ItemFilter) -> Result<Vec<String>> {
        if let Some(ref cat) = filter.category {
            if ! self.categories.values().any(|c| c == cat) {
                return Err(ModelError::config(format!("Dimension '{}' has no category '{}'",self.id,cat)));
            }
        }
        for name in filter.values.keys() {
            if ! self.filters.contains_key(name) {
                return Err(ModelError::config(format!("Dimension '{}' has no filter '{}'",self.id,name)));
            }
        }

        let items : Vec<String> = self.items.iter()
            .filter(|item| filter.category.as_ref().map(|cat| self.categories.get(*item) == Some(cat)).unwrap_or(true))
            .filter(|item| filter.values.iter().all(|(name,accepted)| {
                self.filters.get(name)
                    .and_then(|m| m.get(*item))
                    .map(|v| accepted.contains(v))
                    .unwrap_or(false)
            }))
            .cloned()
            .collect();

        if items.is_empty() {
            Err(ModelError::config(format!("Filter on dimension '{}' leaves no items",self.id)))
        }
        else {
            Ok(items)
        }
    }
}

/// Identifies one sub-problem: one item for each splitting dimension, in registry order. The
/// default key (no splitting dimensions) is empty.
#[derive(Debug,Clone,PartialEq,Eq,PartialOrd,Ord,Hash,Default)]
pub struct SubProblemKey {
    coords : Vec<(String,String)>,
}

impl SubProblemKey {
    pub fn new(coords : Vec<(String,String)>) -> SubProblemKey { SubProblemKey{ coords } }
    pub fn default_key() -> SubProblemKey { SubProblemKey{ coords : Vec::new() } }
    pub fn is_default(&self) -> bool { self.coords.is_empty() }
    pub fn coords(&self) -> &[(String,String)] { self.coords.as_slice() }
    /// Item selected for `dim`, if `dim` is one of the key's dimensions.
    pub fn item(&self, dim : &str) -> Option<&str> {
        self.coords.iter().find(|(d,_)| d == dim).map(|(_,i)| i.as_str())
    }
    /// Short label: items joined by ','; "default" for the default key.
    pub fn label(&self) -> String {
        if self.coords.is_empty() { "default".to_string() }
        else { self.coords.iter().map(|(_,i)| i.as_str()).join(",") }
    }
    /// True if every coordinate in `coords` that names a dimension of this key agrees with it.
    pub fn agrees_with(&self, coords : &[(String,String)]) -> bool {
        coords.iter().all(|(d,i)| self.item(d).map(|v| v == i).unwrap_or(true))
    }
}

impl fmt::Display for SubProblemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.coords.is_empty() {
            f.write_str("[default]")
        }
        else {
            write!(f,"[{}]",self.coords.iter().map(|(d,i)| format!("{}={}",d,i)).join(","))
        }
    }
}

/// Ordered collection of dimensions, addressed by id.
#[derive(Debug,Clone,Default)]
pub struct SetRegistry {
    dims  : Vec<Dimension>,
    index : HashMap<String,usize>,
}

impl SetRegistry {
    pub fn new() -> SetRegistry { Default::default() }

    pub fn insert(& mut self, dim : Dimension) -> Result<()> {
        if self.index.contains_key(&dim.id) {
            return Err(ModelError::config(format!("Duplicate dimension '{}'",dim.id)));
        }
        self.index.insert(dim.id.clone(), self.dims.len());
        self.dims.push(dim);
        Ok(())
    }

    pub fn get(&self, id : &str) -> Result<&Dimension> {
        self.index.get(id)
            .map(|&i| &self.dims[i])
            .ok_or_else(|| ModelError::missing(format!("Dimension '{}' not defined",id)))
    }

    pub fn contains(&self, id : &str) -> bool { self.index.contains_key(id) }

    /// Replace the items of an existing dimension.
    pub fn set_items(& mut self, id : &str, items : Vec<String>) -> Result<()> {
        let &i = self.index.get(id).ok_or_else(|| ModelError::missing(format!("Dimension '{}' not defined",id)))?;
        self.dims[i].items = items;
        Ok(())
    }

    pub fn iter(&self) -> std::slice::Iter<'_,Dimension> { self.dims.iter() }

    pub fn splitting(&self) -> impl Iterator<Item = &Dimension> { self.dims.iter().filter(|d| d.splits_problem) }

    pub fn is_splitting(&self, id : &str) -> bool { self.get(id).map(|d| d.splits_problem).unwrap_or(false) }

    /// All sub-problem keys: the cartesian product of the splitting dimensions' items, in
    /// registry and item order. Without splitting dimensions this is the single default key.
    pub fn sub_problem_keys(&self) -> Vec<SubProblemKey> {
        let split : Vec<&Dimension> = self.splitting().collect();
        if split.is_empty() {
            return vec![SubProblemKey::default_key()];
        }
        split.iter()
            .map(|d| d.items.iter().map(move |i| (d.id.clone(),i.clone())))
            .multi_cartesian_product()
            .map(SubProblemKey::new)
            .collect()
    }
}

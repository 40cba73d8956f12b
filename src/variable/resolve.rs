//! Coordinate resolution.

use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{ModelError,Result};
use crate::sets::SetRegistry;
use crate::table::{TableDecl,VarType};
use super::{ConstantKind,ShapeSpec,VariableDecl};

/// Partition of a table's coordinates as seen by one variable.
#[derive(Debug,Clone,PartialEq,Eq,Default)]
pub struct Coordinates {
    pub rows  : Option<String>,
    pub cols  : Option<String>,
    pub intra : Option<String>,
    pub inter : Vec<String>,
}

impl Coordinates {
    /// All dimensions in the partition.
    pub fn dims(&self) -> Vec<&str> {
        self.rows.iter().chain(self.cols.iter()).chain(self.intra.iter()).chain(self.inter.iter())
            .map(|s| s.as_str())
            .collect()
    }
}

/// A variable declaration resolved against its table and the set registry.
#[derive(Debug,Clone,PartialEq)]
pub struct ResolvedVariable {
    pub symbol      : String,
    pub table       : String,
    pub kind        : VarType,
    pub integer     : bool,
    pub value       : Option<ConstantKind>,
    pub coords      : Coordinates,
    /// Filtered items of every coordinate dimension, in dimension order
    pub items       : BTreeMap<String,Vec<String>>,
    pub shape       : [usize;2],
    /// (row item, column item) pairs relating the row and column dimensions, if they are related
    pub aggregation : Option<Vec<(String,String)>>,
}

impl ResolvedVariable {
    pub fn is_constant(&self) -> bool { self.kind.is_constant() }
    pub fn intra_items(&self) -> Option<&[String]> {
        self.coords.intra.as_ref().and_then(|d| self.items.get(d)).map(|v| v.as_slice())
    }
    pub fn row_items(&self) -> Option<&[String]> {
        self.coords.rows.as_ref().and_then(|d| self.items.get(d)).map(|v| v.as_slice())
    }
    pub fn col_items(&self) -> Option<&[String]> {
        self.coords.cols.as_ref().and_then(|d| self.items.get(d)).map(|v| v.as_slice())
    }
}

fn check_shape_dim(spec : &ShapeSpec, table : &TableDecl, var : &VariableDecl, sets : &SetRegistry) -> Result<()> {
    if let Some(d) = spec.dim() {
        if ! sets.contains(d) {
            return Err(ModelError::config(format!("Variable '{}': dimension '{}' not defined",var.symbol,d)));
        }
        if ! table.coordinates.iter().any(|c| c == d) {
            return Err(ModelError::config(format!("Variable '{}': dimension '{}' is not a coordinate of table '{}'",var.symbol,d,table.name)));
        }
    }
    Ok(())
}

/// Resolve `var`, declared on `table`, against `sets`.
///
/// Every table coordinate lands in exactly one of rows, cols, intra, inter: the coordinate
/// matching the row spec goes to rows, the one matching the column spec to cols, a
/// non-splitting coordinate goes to intra and a splitting one to inter. A second intra
/// candidate is a [ModelError::ConceptualModel].
pub fn resolve(var : &VariableDecl, table : &TableDecl, sets : &SetRegistry) -> Result<ResolvedVariable> {
    check_shape_dim(&var.rows, table, var, sets)?;
    check_shape_dim(&var.cols, table, var, sets)?;

    if var.rows.dim().is_some() && var.rows == var.cols && ! table.kind.is_constant() {
        return Err(ModelError::config(format!("Variable '{}': rows and columns use the same dimension",var.symbol)));
    }
    match (table.kind.is_constant(), &var.value) {
        (true,None) => return Err(ModelError::config(format!("Constant variable '{}' has no value kind",var.symbol))),
        (false,Some(_)) => return Err(ModelError::config(format!("Variable '{}' has a value kind but table '{}' is not constant",var.symbol,table.name))),
        _ => {}
    }
    if let Some(d) = var.filters.keys().find(|d| ! table.coordinates.contains(d)) {
        return Err(ModelError::config(format!("Variable '{}': filter on '{}', which is not a coordinate of '{}'",var.symbol,d,table.name)));
    }

    let mut coords = Coordinates::default();
    for d in table.coordinates.iter() {
        let dim = sets.get(d).map_err(|_| ModelError::config(format!("Table '{}': dimension '{}' not defined",table.name,d)))?;
        let as_rows = var.rows.dim() == Some(d.as_str());
        let as_cols = var.cols.dim() == Some(d.as_str());
        if as_rows || as_cols {
            if as_rows { coords.rows = Some(d.clone()); }
            if as_cols { coords.cols = Some(d.clone()); }
        }
        else if ! dim.splits_problem {
            if let Some(ref other) = coords.intra {
                return Err(ModelError::conceptual(
                    format!("Variable '{}' has more than one intra dimension ('{}' and '{}')",var.symbol,other,d)));
            }
            coords.intra = Some(d.clone());
        }
        else {
            coords.inter.push(d.clone());
        }
    }

    if table.kind.has_endogenous() {
        if let Some(d) = coords.rows.iter().chain(coords.cols.iter()).find(|d| sets.is_splitting(d)) {
            return Err(ModelError::conceptual(
                format!("Variable '{}' of endogenous table '{}' uses splitting dimension '{}' as rows or columns",var.symbol,table.name,d)));
        }
    }

    let mut items = BTreeMap::new();
    for d in table.coordinates.iter() {
        let dim = sets.get(d)?;
        if dim.is_empty() {
            return Err(ModelError::missing(format!("Dimension '{}' has no items",d)));
        }
        let it = match var.filters.get(d) {
            Some(f) if ! f.is_empty() => dim.filtered_items(f)?,
            _ => dim.items.clone(),
        };
        items.insert(d.clone(), it);
    }

    let shape = [
        coords.rows.as_ref().map(|d| items[d].len()).unwrap_or(1),
        coords.cols.as_ref().map(|d| items[d].len()).unwrap_or(1),
    ];

    let aggregation = match (&coords.rows,&coords.cols) {
        (Some(r),Some(c)) => aggregation_map(r, &items[r], c, &items[c], sets)?,
        _ => None
    };

    debug!(variable = %var.symbol, table = %table.name, ?shape, intra = ?coords.intra, inter = ?coords.inter, "resolved variable");

    Ok(ResolvedVariable{
        symbol  : var.symbol.clone(),
        table   : table.name.clone(),
        kind    : table.kind.clone(),
        integer : table.integer,
        value   : var.value,
        coords,
        items,
        shape,
        aggregation,
    })
}

/// Pairs (row item, column item) relating two dimensions. Identical dimensions relate each
/// item to itself; otherwise one of the dimensions must map its items onto the other one's
/// items through its aggregation map.
pub fn aggregation_map(rows_dim : &str, rows : &[String], cols_dim : &str, cols : &[String], sets : &SetRegistry) -> Result<Option<Vec<(String,String)>>> {
    if rows_dim == cols_dim {
        return Ok(Some(rows.iter().filter(|r| cols.contains(r)).map(|r| (r.clone(),r.clone())).collect()));
    }
    let rd = sets.get(rows_dim)?;
    let cd = sets.get(cols_dim)?;

    let covers = |child : &crate::sets::Dimension, parent : &crate::sets::Dimension| {
        ! child.aggregation.is_empty() && child.aggregation.values().all(|p| parent.items.contains(p))
    };

    if covers(cd,rd) {
        Ok(Some(cols.iter()
            .filter_map(|c| cd.aggregation.get(c).filter(|p| rows.contains(p)).map(|p| (p.clone(),c.clone())))
            .collect()))
    }
    else if covers(rd,cd) {
        Ok(Some(rows.iter()
            .filter_map(|r| rd.aggregation.get(r).filter(|p| cols.contains(p)).map(|p| (r.clone(),p.clone())))
            .collect()))
    }
    else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sets::Dimension;
    use crate::table::TableKind;

    fn sets() -> SetRegistry {
        let mut r = SetRegistry::new();
        r.insert(Dimension::new("A", &["a1","a2"])).unwrap();
        r.insert(Dimension::new("B", &["b1","b2","b3"])).unwrap();
        r.insert(Dimension::new("C", &["c1","c2"])).unwrap();
        r.insert(Dimension::new("S", &["s1","s2"]).splitting()).unwrap();
        r
    }

    #[test]
    fn partition() {
        let r = sets();
        let t = TableDecl::new("T", TableKind::Exogenous, &["A","B","C","S"]);
        let v = resolve(&VariableDecl::new("x", Some("A"), Some("B")), &t, &r).unwrap();
        assert_eq!(v.coords.rows.as_deref(), Some("A"));
        assert_eq!(v.coords.cols.as_deref(), Some("B"));
        assert_eq!(v.coords.intra.as_deref(), Some("C"));
        assert_eq!(v.coords.inter, vec!["S".to_string()]);
        assert_eq!(v.shape, [2,3]);
        assert_eq!(v.coords.dims().len(), 4);
    }

    #[test]
    fn two_intra() {
        let r = sets();
        let t = TableDecl::new("T", TableKind::Exogenous, &["A","B","C"]);
        let e = resolve(&VariableDecl::new("x", Some("A"), None), &t, &r).unwrap_err();
        assert_eq!(e.kind(), crate::ErrorKind::ConceptualModel);
    }

    #[test]
    fn scalar_shape() {
        let r = sets();
        let t = TableDecl::new("T", TableKind::Endogenous, &["S"]);
        let v = resolve(&VariableDecl::new("x", None, None), &t, &r).unwrap();
        assert_eq!(v.shape, [1,1]);
        assert_eq!(v.coords.inter, vec!["S".to_string()]);

        let e = resolve(&VariableDecl::new("y", Some("S"), None), &t, &r).unwrap_err();
        assert_eq!(e.kind(), crate::ErrorKind::ConceptualModel);
        let e = resolve(&VariableDecl::new("z", Some("A"), None), &t, &r).unwrap_err();
        assert_eq!(e.kind(), crate::ErrorKind::Configuration);
    }

    #[test]
    fn aggregation() {
        let mut r = SetRegistry::new();
        r.insert(Dimension::new("G", &["g1","g2"])).unwrap();
        r.insert(Dimension::new("P", &["p1","p2","p3"]).with_aggregation(&[("p1","g1"),("p2","g2"),("p3","g1")])).unwrap();
        let t = TableDecl::new("M", TableKind::Constant, &["G","P"]);
        let v = resolve(&VariableDecl::new("m", Some("G"), Some("P")).with_value(ConstantKind::IdentityRcot), &t, &r).unwrap();
        assert_eq!(v.aggregation.unwrap(), vec![
            ("g1".to_string(),"p1".to_string()),
            ("g2".to_string(),"p2".to_string()),
            ("g1".to_string(),"p3".to_string())]);
    }
}

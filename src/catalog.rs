//! Concrete bindings of resolved variables.
//!
//! The catalog owns
//! - one decision block per endogenous table and block key (the table's splitting coordinates),
//!   each block holding one decision column per table row,
//! - one parameter per exogenous binding, filled from storage,
//! - one constant per constant variable,
//!
//! and one [Binding] per variable and (sub-problem key, intra item). Decision columns are
//! numbered globally from 1; index 0 is reserved for the constant term of expressions.

use std::collections::{BTreeMap,HashMap};
use itertools::Itertools;
use tracing::{debug,info};

use crate::error::{ModelError,Result};
use crate::matrix::NDArray;
use crate::sets::{SetRegistry,SubProblemKey};
use crate::storage::{Filter,Row,Storage};
use crate::table::{TableDecl,TableKind,VarType};
use crate::utils::round_to;
use crate::variable::{self,ResolvedVariable};

pub type BindingId = usize;

/// What a binding refers to.
#[derive(Debug,Clone,PartialEq)]
pub enum BindingValue {
    /// Decision columns of a block, row-major in the binding shape
    Slice{ block : usize, idxs : Vec<usize> },
    /// Index into the parameter list
    Parameter(usize),
    /// Index into the constant list
    Constant(usize),
}

#[derive(Debug,Clone,PartialEq)]
pub struct Binding {
    pub id     : BindingId,
    pub symbol : String,
    /// Set for variables whose table kind varies per sub-problem
    pub scope  : Option<SubProblemKey>,
    /// Items of the variable's inter dimensions
    pub inter  : Vec<(String,String)>,
    pub intra  : Option<String>,
    /// Items used to fetch or slice data, per table coordinate
    pub filter : Filter,
    pub shape  : [usize;2],
    pub value  : BindingValue,
}

impl Binding {
    /// True if this binding applies to sub-problem `key`.
    pub fn applies_to(&self, key : &SubProblemKey) -> bool {
        self.scope.as_ref().map(|s| s == key).unwrap_or(true) && key.agrees_with(&self.inter)
    }
    pub fn is_decision(&self) -> bool { matches!(self.value, BindingValue::Slice{..}) }

    /// Inter items followed by the intra item, joined by ','; "default" if there are none.
    pub fn label(&self) -> String {
        let items : Vec<&str> = self.inter.iter().map(|(_,i)| i.as_str()).chain(self.intra.as_deref()).collect();
        if items.is_empty() { "default".to_string() } else { items.join(",") }
    }
}

/// Decision columns for the rows of one block of an endogenous table.
#[derive(Debug,Clone)]
pub struct DecisionBlock {
    pub table   : String,
    pub key     : SubProblemKey,
    pub coords  : Vec<Vec<String>>,
    pub first   : usize,
    pub integer : bool,
    position    : HashMap<Vec<String>,usize>,
}

impl DecisionBlock {
    pub fn len(&self) -> usize { self.coords.len() }
    pub fn is_empty(&self) -> bool { self.coords.is_empty() }
    pub fn columns(&self) -> std::ops::Range<usize> { self.first..self.first+self.coords.len() }
}

#[derive(Debug,Clone)]
pub struct Parameter {
    pub binding : BindingId,
    pub table   : String,
    pub shape   : [usize;2],
    pub value   : Option<NDArray<2>>,
}

pub struct VariableCatalog {
    variables   : Vec<ResolvedVariable>,
    var_index   : HashMap<String,usize>,
    table_coords: HashMap<String,Vec<String>>,
    bindings    : Vec<Binding>,
    by_symbol   : HashMap<String,Vec<BindingId>>,
    blocks      : Vec<DecisionBlock>,
    block_index : HashMap<(String,SubProblemKey),usize>,
    parameters  : Vec<Parameter>,
    constants   : Vec<NDArray<2>>,
    values      : Vec<Option<f64>>,
    integer     : Vec<bool>,
}

/// Build the coordinate vector, in table order, for row item `r` and column item `c` of a
/// binding.
fn table_row(table_coords : &[String], var : &ResolvedVariable, r : Option<&str>, c : Option<&str>, intra : Option<&str>, inter : &[(String,String)]) -> Vec<String> {
    table_coords.iter()
        .map(|d| {
            if var.coords.rows.as_deref() == Some(d.as_str()) { r.unwrap_or_default().to_string() }
            else if var.coords.cols.as_deref() == Some(d.as_str()) { c.unwrap_or_default().to_string() }
            else if var.coords.intra.as_deref() == Some(d.as_str()) { intra.unwrap_or_default().to_string() }
            else { inter.iter().find(|(id,_)| id == d).map(|(_,i)| i.clone()).unwrap_or_default() }
        })
        .collect()
}

impl VariableCatalog {
    /// Resolve all variables declared on `tables` and create their bindings for the sub-problems
    /// `keys`.
    pub fn build(tables : &[TableDecl], sets : &SetRegistry) -> Result<VariableCatalog> {
        let keys = sets.sub_problem_keys();
        let mut cat = VariableCatalog{
            variables    : Vec::new(),
            var_index    : HashMap::new(),
            table_coords : tables.iter().map(|t| (t.name.clone(),t.coordinates.clone())).collect(),
            bindings     : Vec::new(),
            by_symbol    : HashMap::new(),
            blocks       : Vec::new(),
            block_index  : HashMap::new(),
            parameters   : Vec::new(),
            constants    : Vec::new(),
            values       : vec![Some(1.0)],
            integer      : vec![false],
        };

        if let Some(t) = tables.iter().map(|t| &t.name).duplicates().next() {
            return Err(ModelError::config(format!("Duplicate table '{}'",t)));
        }

        for t in tables.iter() {
            if let VarType::PerSubProblem(m) = &t.kind {
                if m.values().any(|k| *k == TableKind::Constant) {
                    return Err(ModelError::config(format!("Table '{}': constant tables cannot vary per sub-problem",t.name)));
                }
                if let Some(k) = keys.iter().find(|k| ! m.contains_key(k)) {
                    return Err(ModelError::config(format!("Table '{}': no type given for sub-problem {}",t.name,k)));
                }
            }
            if t.kind.has_endogenous() {
                cat.add_blocks(t, sets)?;
            }
            for v in t.variables.iter() {
                if cat.var_index.contains_key(&v.symbol) {
                    return Err(ModelError::config(format!("Duplicate variable symbol '{}'",v.symbol)));
                }
                let rv = variable::resolve(v, t, sets)?;
                cat.var_index.insert(rv.symbol.clone(), cat.variables.len());
                cat.variables.push(rv);
            }
        }

        for vi in 0..cat.variables.len() {
            let var = cat.variables[vi].clone();
            cat.add_bindings(&var, &keys)?;
        }

        info!(variables = cat.variables.len(),
              bindings = cat.bindings.len(),
              columns = cat.values.len()-1,
              parameters = cat.parameters.len(),
              "variable catalog built");
        Ok(cat)
    }

    fn add_blocks(& mut self, t : &TableDecl, sets : &SetRegistry) -> Result<()> {
        for (key,coords) in t.enumerate_blocks(sets)? {
            let first = self.values.len();
            let position = coords.iter().enumerate().map(|(i,c)| (c.clone(),i)).collect();
            self.values.extend(std::iter::repeat(None).take(coords.len()));
            self.integer.extend(std::iter::repeat(t.integer).take(coords.len()));
            debug!(table = %t.name, block = %key, columns = coords.len(), "decision block");
            self.block_index.insert((t.name.clone(),key.clone()), self.blocks.len());
            self.blocks.push(DecisionBlock{ table : t.name.clone(), key, coords, first, integer : t.integer, position });
        }
        Ok(())
    }

    fn add_bindings(& mut self, var : &ResolvedVariable, keys : &[SubProblemKey]) -> Result<()> {
        if var.is_constant() {
            let value = variable::constant::build_for(var)?;
            self.constants.push(value);
            let c = self.constants.len()-1;
            self.push_binding(var, None, Vec::new(), None, BindingValue::Constant(c));
            return Ok(());
        }

        let inter_items : Vec<Vec<(String,String)>> =
            if var.coords.inter.is_empty() {
                vec![Vec::new()]
            }
            else {
                var.coords.inter.iter()
                    .map(|d| var.items[d].iter().map(move |i| (d.clone(),i.clone())))
                    .multi_cartesian_product()
                    .collect()
            };
        let intra_items : Vec<Option<String>> = match var.intra_items() {
            Some(items) => items.iter().map(|i| Some(i.clone())).collect(),
            None => vec![None],
        };

        // (scope, kind) pairs to generate bindings for
        let scopes : Vec<(Option<SubProblemKey>,TableKind)> = match &var.kind {
            VarType::Fixed(k) => vec![(None,*k)],
            VarType::PerSubProblem(_) => keys.iter()
                .map(|k| Ok((Some(k.clone()),var.kind.kind_for(k)?)))
                .collect::<Result<Vec<_>>>()?,
        };

        for (scope,kind) in scopes {
            for inter in inter_items.iter() {
                if let Some(ref k) = scope {
                    if ! k.agrees_with(inter) { continue; }
                }
                for intra in intra_items.iter() {
                    let value = match kind {
                        TableKind::Exogenous => {
                            self.parameters.push(Parameter{
                                binding : self.bindings.len(),
                                table   : var.table.clone(),
                                shape   : var.shape,
                                value   : None });
                            BindingValue::Parameter(self.parameters.len()-1)
                        },
                        TableKind::Endogenous => self.slice(var, intra.as_deref(), inter)?,
                        TableKind::Constant => return Err(ModelError::config(format!("Variable '{}': invalid constant binding",var.symbol))),
                    };
                    self.push_binding(var, scope.clone(), inter.clone(), intra.clone(), value);
                }
            }
        }
        Ok(())
    }

    fn slice(&self, var : &ResolvedVariable, intra : Option<&str>, inter : &[(String,String)]) -> Result<BindingValue> {
        let key = SubProblemKey::new(inter.to_vec());
        let &b = self.block_index.get(&(var.table.clone(),key.clone()))
            .ok_or_else(|| ModelError::missing(format!("No decision block for table '{}' and {}",var.table,key)))?;
        let block = &self.blocks[b];
        let coords = &self.table_coords[&var.table];

        let rows : Vec<Option<&str>> = var.row_items().map(|v| v.iter().map(|s| Some(s.as_str())).collect()).unwrap_or_else(|| vec![None]);
        let cols : Vec<Option<&str>> = var.col_items().map(|v| v.iter().map(|s| Some(s.as_str())).collect()).unwrap_or_else(|| vec![None]);

        let mut idxs = Vec::with_capacity(rows.len()*cols.len());
        for r in rows.iter() {
            for c in cols.iter() {
                let row = table_row(coords, var, *r, *c, intra, inter);
                let p = block.position.get(&row)
                    .ok_or_else(|| ModelError::missing(format!("Table '{}' has no row {:?}",var.table,row)))?;
                idxs.push(block.first + p);
            }
        }
        Ok(BindingValue::Slice{ block : b, idxs })
    }

    fn push_binding(& mut self, var : &ResolvedVariable, scope : Option<SubProblemKey>, inter : Vec<(String,String)>, intra : Option<String>, value : BindingValue) {
        let mut filter = Filter::new();
        if let Some(ref d) = var.coords.rows { filter.insert(d.clone(), var.items[d].clone()); }
        if let Some(ref d) = var.coords.cols { filter.insert(d.clone(), var.items[d].clone()); }
        if let (Some(d),Some(i)) = (&var.coords.intra,&intra) { filter.insert(d.clone(), vec![i.clone()]); }
        for (d,i) in inter.iter() { filter.insert(d.clone(), vec![i.clone()]); }

        let id = self.bindings.len();
        self.by_symbol.entry(var.symbol.clone()).or_default().push(id);
        self.bindings.push(Binding{
            id,
            symbol : var.symbol.clone(),
            scope,
            inter,
            intra,
            filter,
            shape  : var.shape,
            value,
        });
    }

    pub fn variable(&self, symbol : &str) -> Option<&ResolvedVariable> {
        self.var_index.get(symbol).map(|&i| &self.variables[i])
    }
    pub fn variables(&self) -> &[ResolvedVariable] { self.variables.as_slice() }
    pub fn binding(&self, id : BindingId) -> &Binding { &self.bindings[id] }
    pub fn bindings(&self) -> &[Binding] { self.bindings.as_slice() }
    pub fn bindings_of(&self, symbol : &str) -> &[BindingId] {
        self.by_symbol.get(symbol).map(|v| v.as_slice()).unwrap_or(&[])
    }
    pub fn blocks(&self) -> &[DecisionBlock] { self.blocks.as_slice() }
    pub fn parameters(&self) -> &[Parameter] { self.parameters.as_slice() }
    pub fn constant(&self, i : usize) -> &NDArray<2> { &self.constants[i] }
    pub fn num_columns(&self) -> usize { self.values.len()-1 }
    pub fn is_integer(&self, col : usize) -> bool { self.integer[col] }

    /// Bindings of `symbol` applying to sub-problem `key`, restricted to intra item `intra` if
    /// given.
    pub fn candidates(&self, symbol : &str, key : &SubProblemKey, intra : Option<&str>) -> Vec<BindingId> {
        self.bindings_of(symbol).iter()
            .filter(|&&b| {
                let b = &self.bindings[b];
                b.applies_to(key) && intra.map(|i| b.intra.as_deref() == Some(i)).unwrap_or(true)
            })
            .cloned()
            .collect()
    }

    /// Current value of an exogenous parameter.
    pub fn parameter_value(&self, p : usize) -> Result<&NDArray<2>> {
        let par = &self.parameters[p];
        par.value.as_ref().ok_or_else(|| ModelError::missing(
            format!("No data loaded for '{}' (table '{}')",self.bindings[par.binding].symbol,par.table)))
    }

    pub fn set_parameter(& mut self, p : usize, value : NDArray<2>) -> Result<()> {
        let par = &mut self.parameters[p];
        if value.shape() != par.shape {
            return Err(ModelError::conceptual(format!("Parameter of shape {:?} cannot take a value of shape {:?}",par.shape,value.shape())));
        }
        par.value = Some(value);
        Ok(())
    }

    /// Fill every exogenous parameter from storage. Missing rows or undefined values are an
    /// error.
    pub fn load_exogenous(& mut self, storage : &dyn Storage) -> Result<()> {
        for p in 0..self.parameters.len() {
            let b = &self.bindings[self.parameters[p].binding];
            let var = &self.variables[self.var_index[&b.symbol]];
            let rows = storage.get_rows(&var.table, &b.filter)?;
            let coords = storage.coordinates(&var.table)?;

            let ri = var.coords.rows.as_ref().and_then(|d| coords.iter().position(|c| c == d));
            let ci = var.coords.cols.as_ref().and_then(|d| coords.iter().position(|c| c == d));
            let row_items = var.row_items();
            let col_items = var.col_items();

            let [m,n] = b.shape;
            let mut data : Vec<Option<f64>> = vec![None; m*n];
            for row in rows.iter() {
                let i = match (ri,row_items) { (Some(ri),Some(items)) => items.iter().position(|it| *it == row.coords[ri]), _ => Some(0) };
                let j = match (ci,col_items) { (Some(ci),Some(items)) => items.iter().position(|it| *it == row.coords[ci]), _ => Some(0) };
                if let (Some(i),Some(j)) = (i,j) {
                    data[i*n+j] = row.value.filter(|v| ! v.is_nan());
                }
            }
            if let Some(k) = data.iter().position(|v| v.is_none()) {
                return Err(ModelError::missing(format!(
                    "Missing data for '{}' in table '{}' at {:?}, filter {:?}",
                    b.symbol,var.table,[k/n,k%n],b.filter)));
            }
            let value = NDArray::new(b.shape, None, data.into_iter().flatten().collect()).map_err(ModelError::missing)?;
            self.parameters[p].value = Some(value);
        }
        debug!(parameters = self.parameters.len(), "exogenous data loaded");
        Ok(())
    }

    /// Solution value of a decision column.
    pub fn value(&self, col : usize) -> Option<f64> { self.values.get(col).copied().flatten() }

    pub fn set_values(& mut self, cols : &[usize], vals : &[f64]) {
        for (&c,&v) in cols.iter().zip(vals.iter()) {
            self.values[c] = Some(v);
        }
    }

    /// Values of a binding, row-major. Decision entries without a solution are `None`.
    pub fn binding_values(&self, id : BindingId) -> Result<Vec<Option<f64>>> {
        match &self.bindings[id].value {
            BindingValue::Slice{ idxs, .. } => Ok(idxs.iter().map(|&c| self.value(c)).collect()),
            BindingValue::Parameter(p) => Ok(self.parameter_value(*p)?.to_vec().into_iter().map(Some).collect()),
            BindingValue::Constant(c) => Ok(self.constants[*c].to_vec().into_iter().map(Some).collect()),
        }
    }

    /// Tables with decision blocks.
    pub fn endogenous_tables(&self) -> Vec<String> {
        self.blocks.iter().map(|b| b.table.clone()).unique().collect()
    }

    /// Rows of solved decision columns, per table. Values are rounded to `digits` decimals.
    pub fn endogenous_rows(&self, digits : u32) -> BTreeMap<String,Vec<Row>> {
        let mut res : BTreeMap<String,Vec<Row>> = BTreeMap::new();
        for b in self.blocks.iter() {
            let rows = res.entry(b.table.clone()).or_default();
            for (coords,c) in b.coords.iter().zip(b.columns()) {
                if let Some(v) = self.values[c] {
                    rows.push(Row{ coords : coords.clone(), value : Some(round_to(v,digits)) });
                }
            }
        }
        res
    }

    pub fn table_coordinates(&self, table : &str) -> Option<&[String]> {
        self.table_coords.get(table).map(|v| v.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sets::Dimension;
    use crate::storage::{MemoryStore,WriteMode};
    use crate::variable::VariableDecl;

    fn sets() -> SetRegistry {
        let mut r = SetRegistry::new();
        r.insert(Dimension::new("A", &["a1","a2"])).unwrap();
        r.insert(Dimension::new("C", &["c1","c2","c3"])).unwrap();
        r.insert(Dimension::new("S", &["s1","s2"]).splitting()).unwrap();
        r
    }

    #[test]
    fn endogenous_slices() {
        let r = sets();
        let t = TableDecl::new("X", TableKind::Endogenous, &["A","C","S"])
            .with_variable(VariableDecl::new("x", Some("A"), None));
        let cat = VariableCatalog::build(&[t], &r).unwrap();
        assert_eq!(cat.blocks().len(), 2);
        assert_eq!(cat.num_columns(), 12);
        // one binding per (s, c)
        assert_eq!(cat.bindings_of("x").len(), 6);

        let key = SubProblemKey::new(vec![("S".to_string(),"s2".to_string())]);
        let c = cat.candidates("x", &key, Some("c2"));
        assert_eq!(c.len(), 1);
        let b = cat.binding(c[0]);
        assert_eq!(b.shape, [2,1]);
        assert_eq!(b.filter["S"], vec!["s2"]);
        assert_eq!(b.filter["A"], vec!["a1","a2"]);
        // block s2 rows are (a,c) in C order: a1c1,a1c2,a1c3,a2c1,...
        match &b.value {
            BindingValue::Slice{ block, idxs } => {
                let first = cat.blocks()[*block].first;
                assert_eq!(idxs, &vec![first+1,first+4]);
            },
            _ => panic!("expected a slice")
        }

        // (key, intra) pairs are unique
        let mut seen = std::collections::HashSet::new();
        for &id in cat.bindings_of("x") {
            let b = cat.binding(id);
            assert!(seen.insert((b.inter.clone(),b.intra.clone())));
        }
    }

    #[test]
    fn exogenous_from_storage() {
        let r = sets();
        let t = TableDecl::new("D", TableKind::Exogenous, &["A"])
            .with_variable(VariableDecl::new("d", Some("A"), None));
        let mut cat = VariableCatalog::build(&[t], &r).unwrap();
        assert!(cat.parameter_value(0).is_err());

        let mut st = MemoryStore::new();
        st.create_table("D", &["A".to_string()]).unwrap();
        st.put_rows("D", vec![Row::new(&["a2"], Some(2.0))], WriteMode::Insert).unwrap();
        let e = cat.load_exogenous(&st).unwrap_err();
        assert_eq!(e.kind(), crate::ErrorKind::MissingData);

        st.put_rows("D", vec![Row::new(&["a1"], Some(1.0))], WriteMode::Insert).unwrap();
        cat.load_exogenous(&st).unwrap();
        assert_eq!(cat.parameter_value(0).unwrap().to_vec(), vec![1.0,2.0]);
    }

    #[test]
    fn per_sub_problem() {
        let r = sets();
        let k1 = SubProblemKey::new(vec![("S".to_string(),"s1".to_string())]);
        let k2 = SubProblemKey::new(vec![("S".to_string(),"s2".to_string())]);
        let kind = VarType::PerSubProblem([(k1.clone(),TableKind::Endogenous),(k2.clone(),TableKind::Exogenous)].into_iter().collect());
        let t = TableDecl::new("U", TableKind::Endogenous, &["A"]).with_kind(kind)
            .with_variable(VariableDecl::new("u", Some("A"), None));
        let cat = VariableCatalog::build(&[t.clone()], &r).unwrap();
        let b1 = cat.candidates("u", &k1, None);
        let b2 = cat.candidates("u", &k2, None);
        assert_eq!((b1.len(),b2.len()), (1,1));
        assert!(cat.binding(b1[0]).is_decision());
        assert!(! cat.binding(b2[0]).is_decision());

        let partial = VarType::PerSubProblem([(k1,TableKind::Endogenous)].into_iter().collect());
        let t = t.with_kind(partial);
        assert_eq!(VariableCatalog::build(&[t], &r).err().map(|e| e.kind()), Some(crate::ErrorKind::Configuration));
    }
}

//! Literal constants.

use serde::{Deserialize,Serialize};

use crate::error::{ModelError,Result};
use crate::matrix::{self,NDArray};
use super::ResolvedVariable;

/// Literal kinds a constant variable can take.
#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash,Serialize,Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstantKind {
    /// Square identity
    Identity,
    /// Vector of ones
    SumVector,
    /// Ones on and below the diagonal
    LowerTriangular,
    /// 0, 1, 2, ... filled column by column
    #[serde(rename = "arange_0")]
    Arange0,
    /// 1, 2, 3, ... filled column by column
    #[serde(rename = "arange_1")]
    Arange1,
    /// Number of items of the vector dimension
    SetLength,
    /// Assignment matrix from the aggregation map relating rows and columns
    #[serde(alias = "assignment")]
    IdentityRcot,
}

impl ConstantKind {
    pub fn parse(s : &str) -> Result<ConstantKind> {
        match s {
            "identity"         => Ok(ConstantKind::Identity),
            "sum_vector"       => Ok(ConstantKind::SumVector),
            "lower_triangular" => Ok(ConstantKind::LowerTriangular),
            "arange_0"         => Ok(ConstantKind::Arange0),
            "arange_1"         => Ok(ConstantKind::Arange1),
            "set_length"       => Ok(ConstantKind::SetLength),
            "identity_rcot" | "assignment" => Ok(ConstantKind::IdentityRcot),
            _ => Err(ModelError::config(format!("Unknown constant kind '{}'",s)))
        }
    }
}

fn arange(shape : [usize;2], start : usize) -> NDArray<2> {
    let (m,n) = (shape[0],shape[1]);
    // column-major numbering
    let data : Vec<f64> = (0..m).flat_map(|i| (0..n).map(move |j| (start + j*m + i) as f64)).collect();
    matrix::dense(shape, data)
}

/// Build the value of a constant of kind `kind` for a variable of shape `shape`.
///
/// `aggregation` holds (row item, column item) pairs together with the row and column item
/// orders, needed by [ConstantKind::IdentityRcot].
pub fn build(kind : ConstantKind, shape : [usize;2], aggregation : Option<(&[(String,String)],&[String],&[String])>) -> Result<NDArray<2>> {
    let square = shape[0] == shape[1];
    let vector = shape[0] == 1 || shape[1] == 1;
    match kind {
        ConstantKind::Identity =>
            if square { Ok(matrix::speye(shape[0])) }
            else { Err(ModelError::conceptual(format!("Identity matrix must be square, variable shape is {:?}",shape))) },
        ConstantKind::LowerTriangular =>
            if square { Ok(matrix::tril_ones(shape[0])) }
            else { Err(ModelError::conceptual(format!("Lower triangular matrix must be square, variable shape is {:?}",shape))) },
        ConstantKind::SumVector =>
            if vector { Ok(matrix::ones(shape)) }
            else { Err(ModelError::conceptual(format!("Summation vector must have one dimension, variable shape is {:?}",shape))) },
        ConstantKind::SetLength =>
            if vector { Ok(matrix::dense([1,1], vec![(shape[0]*shape[1]) as f64])) }
            else { Err(ModelError::conceptual(format!("Set length needs a vector shape, variable shape is {:?}",shape))) },
        ConstantKind::Arange0 => Ok(arange(shape,0)),
        ConstantKind::Arange1 => Ok(arange(shape,1)),
        ConstantKind::IdentityRcot => {
            let (pairs,rows,cols) = aggregation.ok_or_else(|| ModelError::conceptual(
                "Assignment matrix needs rows and columns over the same dimension, or related by aggregation"))?;
            let index : Vec<[usize;2]> = pairs.iter()
                .filter_map(|(r,c)| Some([rows.iter().position(|i| i == r)?, cols.iter().position(|i| i == c)?]))
                .collect();
            let data = vec![1.0; index.len()];
            NDArray::from_tuples(shape, index.as_slice(), data.as_slice()).map_err(ModelError::conceptual)
        }
    }
}

/// Build the value of a resolved constant variable.
pub fn build_for(var : &ResolvedVariable) -> Result<NDArray<2>> {
    let kind = var.value.ok_or_else(|| ModelError::config(format!("Variable '{}' is not a constant",var.symbol)))?;
    let one = [String::new()];
    let rows = var.row_items().unwrap_or(&one);
    let cols = var.col_items().unwrap_or(&one);
    let agg = var.aggregation.as_ref().map(|p| (p.as_slice(),rows,cols));
    build(kind, var.shape, agg)
        .map_err(|e| match e {
            ModelError::ConceptualModel(m) => ModelError::ConceptualModel(format!("Variable '{}': {}",var.symbol,m)),
            e => e
        })
}

//! The closed function vocabulary of symbolic expressions.

use crate::error::{ModelError,Result};
use crate::matrix::{self,NDArray};
use crate::utils::round_to;

#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash)]
pub enum Func {
    Transpose,
    Diag,
    Sum,
    Multiply,
    Shift,
    Pow,
    Minv,
    Weibull,
    Minimize,
    Maximize,
}

impl Func {
    pub fn from_name(name : &str) -> Option<Func> {
        match name {
            "tran" | "transpose"    => Some(Func::Transpose),
            "diag"                  => Some(Func::Diag),
            "sum"                   => Some(Func::Sum),
            "mult" | "multiply"     => Some(Func::Multiply),
            "shift"                 => Some(Func::Shift),
            "pow"                   => Some(Func::Pow),
            "minv"                  => Some(Func::Minv),
            "weib"                  => Some(Func::Weibull),
            "Minimize" | "minimize" => Some(Func::Minimize),
            "Maximize" | "maximize" => Some(Func::Maximize),
            _ => None
        }
    }

    /// Allowed number of arguments, as an inclusive range.
    pub fn arity(&self) -> (usize,usize) {
        match self {
            Func::Transpose | Func::Diag | Func::Minv | Func::Minimize | Func::Maximize => (1,1),
            Func::Sum => (1,2),
            Func::Multiply | Func::Shift | Func::Pow => (2,2),
            Func::Weibull => (4,4),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Func::Transpose => "tran",
            Func::Diag      => "diag",
            Func::Sum       => "sum",
            Func::Multiply  => "mult",
            Func::Shift     => "shift",
            Func::Pow       => "pow",
            Func::Minv      => "minv",
            Func::Weibull   => "weib",
            Func::Minimize  => "Minimize",
            Func::Maximize  => "Maximize",
        }
    }
}

/// Longest support the Weibull density is evaluated over.
pub const MAX_WEIBULL_RANGE : usize = 10_000;

/// Discretised Weibull lifetime distribution.
///
/// The density `sh/sc * (x/sc)^(sh-1) * exp(-(x/sc)^sh)` is evaluated at `x = 1, 2, ...,
/// max(2*sc, n)`, rounded to two decimals, normalized to sum to one and truncated to `n`
/// entries. With `dims == 1` the result is an `n x 1` vector. With `dims == 2` it is an `n x n`
/// matrix whose column `j` is the distribution shifted down by `j` rows.
///
/// Scale and shape must be finite and positive, and neither `2*sc` nor `n` may exceed
/// [MAX_WEIBULL_RANGE].
pub fn weibull(scale : f64, shape : f64, n : usize, dims : usize) -> Result<NDArray<2>> {
    if ! scale.is_finite() || ! shape.is_finite() || scale <= 0.0 || shape <= 0.0 {
        return Err(ModelError::expression(format!("weib: scale and shape must be finite and positive, got {} and {}",scale,shape)));
    }
    if n == 0 {
        return Err(ModelError::expression("weib: range must be positive"));
    }
    if 2.0*scale > MAX_WEIBULL_RANGE as f64 || n > MAX_WEIBULL_RANGE {
        return Err(ModelError::expression(format!("weib: range of scale {} and length {} exceeds {}",scale,n,MAX_WEIBULL_RANGE)));
    }
    let range = ((2.0*scale) as usize).max(n);
    let pdf : Vec<f64> = (1..=range)
        .map(|x| {
            let r = x as f64 / scale;
            round_to(shape/scale * r.powf(shape-1.0) * (-r.powf(shape)).exp(), 2)
        })
        .collect();
    let total : f64 = pdf.iter().sum();
    if total <= 0.0 {
        return Err(ModelError::expression(format!("weib({},{},{}): distribution is zero after rounding",scale,shape,n)));
    }
    let dist : Vec<f64> = pdf.iter().take(n).map(|v| v/total).collect();

    match dims {
        1 => Ok(matrix::dense([n,1], dist)),
        2 => {
            let mut data = vec![0.0; n*n];
            for j in 0..n {
                for i in j..n {
                    data[i*n+j] = dist[i-j];
                }
            }
            Ok(matrix::dense([n,n], data))
        },
        _ => Err(ModelError::expression(format!("weib: dims must be 1 or 2, got {}",dims)))
    }
}

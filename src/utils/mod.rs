pub mod iter;

pub use iter::ChunksByIterExt;

/// Round `v` to `digits` decimals.
pub fn round_to(v : f64, digits : u32) -> f64 {
    let f = 10f64.powi(digits as i32);
    (v * f).round() / f
}

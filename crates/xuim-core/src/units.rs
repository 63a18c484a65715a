//! Byte unit conversion

use crate::error::{Error, Result};

/// Bytes in one GiB
pub const BYTES_PER_GIB: i64 = 1 << 30;

/// Convert a GiB figure to whole bytes, rounding down
pub fn gib_to_bytes(gib: f64) -> Result<i64> {
    if !gib.is_finite() {
        return Err(Error::invalid_input(format!("traffic amount must be finite. Got: {}", gib)));
    }
    if gib < 0.0 {
        return Err(Error::invalid_input(format!(
            "traffic amount cannot be negative. Got: {} GiB",
            gib
        )));
    }

    let bytes = (gib * BYTES_PER_GIB as f64).floor();
    if bytes >= i64::MAX as f64 {
        return Err(Error::invalid_input(format!("traffic amount too large: {} GiB", gib)));
    }
    Ok(bytes as i64)
}

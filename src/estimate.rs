//! Size estimation (§4.2), used to decide the preallocated encode buffer
//! size and whether a frame value crosses the compression threshold.
//!
//! Estimates are upper bounds, not exact wire sizes: they exist so the
//! encoder can allocate once and never grow the buffer mid-write.

use crate::frame::FrameBackend;
use crate::value::Value;

/// Estimate the number of bytes `value` will occupy once encoded.
pub fn estimate_size(value: &Value, backend: &dyn FrameBackend) -> usize {
    match value {
        Value::Null | Value::Boolean(_) | Value::Date(_) => 8,
        Value::Int(_) | Value::Time(_) | Value::Duration(_) | Value::Float(_) => 16,
        Value::Datetime { .. } | Value::Timestamp { .. } => 48,
        Value::String(s) | Value::Cat(s) => 16 + s.len(),
        Value::Err(s) => 16 + s.len(),
        Value::Fn(body) => 8 + body.len(),
        Value::Series(col) => 16 + (backend.estimate_column(col) as f64 * 1.1).ceil() as usize,
        Value::DataFrame(frame) => 16 + (backend.estimate_frame(frame) as f64 * 1.1).ceil() as usize,
        Value::List(items) => {
            16 + items.iter().map(|v| estimate_size(v, backend)).sum::<usize>()
        }
        Value::Dict(entries) => {
            32 + entries
                .iter()
                .map(|(k, v)| 4 + k.len() + estimate_size(v, backend))
                .sum::<usize>()
        }
    }
}

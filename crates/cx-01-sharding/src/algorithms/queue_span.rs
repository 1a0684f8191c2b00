//! # Queue Span Calculator
//!
//! If `Y` renters each cover a uniformly placed span of `S` out of `T`
//! partitions, a fixed partition is missed by one renter with probability
//! `1 - S/T` and by all of them with `(1 - S/T)^Y`. Requiring coverage with
//! probability `P` and solving for `S`:
//!
//! ```text
//! S = T * (1 - (1 - P)^(1/Y))
//! ```
//!
//! A renter subscribes `ceil(S * overlap / 2)` partitions either side of its
//! own node id's leading byte.

use crate::domain::{PartitionRange, ShardError, SpanParams, KEYSPACE_SIZE};

/// Minimal span `S` for `keyspace` partitions, `pool_size` renters and
/// coverage probability `coverage`.
pub fn queue_span(keyspace: u32, pool_size: u32, coverage: f64) -> Result<f64, ShardError> {
    if keyspace == 0 {
        return Err(ShardError::InvalidSpanInput(
            "keyspace must be greater than zero".into(),
        ));
    }
    if pool_size == 0 {
        return Err(ShardError::InvalidSpanInput(
            "pool size must be greater than zero".into(),
        ));
    }
    if !(coverage.is_finite() && coverage > 0.0 && coverage < 1.0) {
        return Err(ShardError::InvalidSpanInput(format!(
            "coverage must be strictly between 0 and 1, got {coverage}"
        )));
    }

    let miss_all = 1.0 - coverage;
    Ok(f64::from(keyspace) * (1.0 - miss_all.powf(1.0 / f64::from(pool_size))))
}

/// Half-width of a renter's subscription: `ceil(S * overlap / 2)`.
pub fn queue_offset(params: &SpanParams) -> Result<u32, ShardError> {
    if !(params.overlap.is_finite() && params.overlap > 0.0) {
        return Err(ShardError::InvalidOverlap(params.overlap));
    }
    let span = queue_span(params.keyspace, params.pool_size, params.coverage)?;
    Ok((span * params.overlap / 2.0).ceil() as u32)
}

/// Partitions `[center - offset, center + offset]`.
///
/// Ranges are not wrapped around the keyspace. A range with an end outside
/// `[0x00, 0xff]` is rejected; the pool size and overlap must be chosen so
/// every renter's range fits. A span at least as wide as the keyspace
/// covers every partition wherever it is centred.
pub fn partition_range(center: u8, offset: u32) -> Result<PartitionRange, ShardError> {
    if 2 * u64::from(offset) + 1 >= u64::from(KEYSPACE_SIZE) {
        return Ok(PartitionRange::full());
    }

    let start = i64::from(center) - i64::from(offset);
    let end = start + 2 * i64::from(offset);
    if start < 0 || end > 255 {
        return Err(ShardError::RangeOutOfBounds {
            center,
            offset,
            start,
            end,
        });
    }

    Ok(PartitionRange {
        start: start as u8,
        end: end as u8,
    })
}

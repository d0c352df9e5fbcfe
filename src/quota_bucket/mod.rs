//! Per-class execution quotas.
//!
//! This module implements the replenishing permit bucket that keeps the
//! gateway inside the upstream provider's per-second quotas:
//! - a reservoir of permits reset each window by a background task
//! - a hard cap on concurrently executing requests
//! - a minimum spacing between consecutive execution starts
//!
//! Two independent instances exist, one per query classification; they share
//! no state, so exhausting one never delays the other.

mod bucket;

pub use bucket::QuotaBucket;

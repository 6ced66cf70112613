//! Inbound market data validation (ambient supplement, grounded on
//! `original_source/runtime/risk/data_validator.py`).
//!
//! Malformed upstream payloads are dropped from the observation stream, not
//! propagated as exceptions (spec §7). This module provides the bounds/shape
//! checks a consumer runs before handing a venue response to the cascade,
//! absorption, or raw-store writers.

pub mod data_quality;

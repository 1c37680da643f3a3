//! Actor implementations
//!
//! - `TuningActor`: serializes inventory reads and tuning actions

pub mod tuning;

//! Situation Assessment generation pipeline.
//!
//! `generation` drives backend attempts and fallback selection, `safety`
//! holds the policy validator and sanitizer, `retry` the shared executor.

pub mod generation;
pub mod retry;
pub mod safety;

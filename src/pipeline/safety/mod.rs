//! Content policy for generated narratives.
//!
//! `policy` decides whether model output may be shown at all; `sanitize`
//! normalizes accepted output into the display shape.

pub mod policy;
pub mod sanitize;
pub mod types;

pub use policy::*;
pub use sanitize::*;
pub use types::*;

pub mod assessment;
pub mod context;
pub mod enums;
pub mod generation;

pub use assessment::*;
pub use context::*;
pub use enums::*;
pub use generation::*;

pub mod finalization;
pub use finalization::*;

pub mod verification;
pub use verification::*;

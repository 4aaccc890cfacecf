pub use super::{coordinator::*, notifier::*, verifier::*};
pub use crate::CoordinatorError;

#[cfg(test)]
pub use serial_test::serial;

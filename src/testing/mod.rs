pub mod coordinator;
pub use coordinator::*;

pub mod notifier;
pub use notifier::*;

pub mod prelude;

pub mod verifier;
pub use verifier::*;

pub mod artifact;
pub use artifact::*;

pub mod contribution_history;
pub use contribution_history::*;

pub mod finalization_record;
pub use finalization_record::*;

pub mod log_entry;
pub use log_entry::*;

pub mod participant;
pub use participant::*;

pub mod setup;
pub use setup::*;

pub mod disk;
pub use disk::*;

pub mod resolver;
pub use resolver::*;

pub mod storage;
pub use storage::*;

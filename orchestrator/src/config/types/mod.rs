pub mod backend;
pub mod checkpoint;
pub mod execution;
pub mod storage;
pub mod tools;

pub use backend::*;
pub use checkpoint::*;
pub use execution::*;
pub use storage::*;
pub use tools::*;

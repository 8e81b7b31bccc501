// Client abstractions module - contains the storage and task backend clients

pub mod executor;
pub mod storage;

// Re-export commonly used types
pub use executor::LocalExecutor;
pub use storage::{local::LocalFsStorage, s3::AWSS3, StorageClient};

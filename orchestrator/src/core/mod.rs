pub mod checkpoint;
pub mod client;
pub mod tool;

pub mod constant;
pub mod context;
pub mod keys;
pub mod stage;

pub use context::{ExecutionContext, StageSkipPolicy};
pub use stage::{CorrectionInput, Stage, Stage1Input, Stage1Output, Stage2Input};

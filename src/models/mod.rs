//! Data models

pub mod synthetic;
pub mod unified;
pub mod job;
pub mod model_version;
pub mod training;
pub mod generation;
pub mod prediction;

pub use synthetic::*;
pub use unified::*;
pub use job::*;
pub use model_version::*;
pub use training::*;
pub use generation::*;
pub use prediction::*;

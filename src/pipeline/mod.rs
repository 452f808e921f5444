//! Training data reconciliation and model training pipeline

pub mod error;
pub mod job_driver;
pub mod orchestrator;
pub mod reconciler;
pub mod registrar;

pub use error::{PipelineError, PipelineResult};
pub use job_driver::{JobDriver, JobDriverConfig};
pub use orchestrator::TrainingOrchestrator;
pub use reconciler::{Reconciler, ReconcilerConfig};
pub use registrar::{Registrar, RegistrarConfig};

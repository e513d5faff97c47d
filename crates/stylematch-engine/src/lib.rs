pub mod compositor;
pub mod dryrun;
pub mod encoder;
pub mod error;
pub mod fragments;
pub mod orchestrator;
pub mod remote;
pub mod tryon;

pub use error::{AnalysisError, CameraError};

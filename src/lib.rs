pub mod client; // Analysis service client + session state machine
pub mod config;
pub mod error;
pub mod models;
pub mod services;

#[cfg(feature = "server")]
pub mod server; // HTTP API (axum)

pub use client::AnalyzerClient;
pub use error::{AnalyzeError, SchemaError, ValidationError};
pub use models::{AnalysisResult, ImageFile, Submission};

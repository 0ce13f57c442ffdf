pub mod config;
pub mod error;
pub mod intent;
pub mod kernel;
pub mod outputs;
pub mod runtime;
pub mod services;

// Re-export specific items for convenient access
pub use config::PipelineConfig;
pub use kernel::machine::PipelineMachine;
pub use runtime::{PipelineHandle, PipelineRuntime};

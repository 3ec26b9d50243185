//! wordforge engine facade: model lifecycle, completion and configuration.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod report;

#[cfg(feature = "cli")]
pub use cli::*;
pub use config::*;
pub use descriptor::*;
pub use error::*;
pub use model::*;
pub use orchestrator::*;
pub use report::*;

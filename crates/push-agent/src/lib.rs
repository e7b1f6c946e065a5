//! Headless push registration agent.
//!
//! Loads its configuration from the environment, wires the push engines to
//! file-backed storage and the HTTP backend client, and runs one command.

pub mod agent;
pub mod config;
pub mod error;
pub mod providers;

pub use agent::Agent;
pub use config::Config;
pub use error::{AppError, AppResult};

//! Public surface for the `selfkey-demo` crate.
//!
//! Exposes the router builder, config and server wiring so that the demo
//! servers can be started in-process as well as from the `selfkey` binary.

pub mod config;
pub mod error;
pub mod handlers;
pub mod manifest;
pub mod remote;
pub mod router;
pub mod server;
pub mod web_did;

pub use config::{DemoConfig, Role};
pub use error::{AppError, DemoError};
pub use handlers::AppState;
pub use router::build_router;
pub use server::{build_agent, serve};

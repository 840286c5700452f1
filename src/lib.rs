//! SkillSwap - a skill-bartering marketplace API.
//!
//! Users post service requests, other users accept and provide them,
//! credits are exchanged on confirmed completion, and participants
//! message each other and rate completed work.
//!
//! # Architecture Layers
//!
//! - **cli**: Command-line interface
//! - **commands**: CLI command implementations
//! - **config**: Application configuration and constants
//! - **domain**: Core business entities and the lifecycle state machine
//! - **services**: Application use cases and business logic
//! - **infra**: Infrastructure concerns (database, cache, job queue)
//! - **realtime**: WebSocket notification fan-out
//! - **api**: HTTP handlers, middleware, and routes
//! - **types**: Shared types (pagination, responses)
//! - **errors**: Centralized error handling
//!
//! # CLI Usage
//!
//! ```bash
//! # Start the server
//! cargo run -- serve
//!
//! # Run migrations
//! cargo run -- migrate up
//!
//! # Run the background job worker
//! cargo run -- jobs work
//! ```

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod infra;
pub mod jobs;
pub mod realtime;
pub mod services;
pub mod types;

// Re-export commonly used types at crate root
pub use api::AppState;
pub use config::Config;
pub use domain::{Password, Service, ServiceStatus, User};
pub use errors::{AppError, AppResult};

//! Voice-server registration gateway.
//!
//! Wires the registration workflow to its front-ends and collaborators: the
//! chat bot loop, the web form and download endpoints, the voice-server
//! directory client, the durable stores and the reconciliation task.

pub mod chat;
pub mod config;
pub mod error;
pub mod tasks;
pub mod web;

pub use config::Config;
pub use error::{AppError, AppResult};

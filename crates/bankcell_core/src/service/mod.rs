//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository, workspace and resolver into use-case APIs.
//! - Keep CLI callers decoupled from storage and resolution details.

pub mod export;
pub mod workspace_service;

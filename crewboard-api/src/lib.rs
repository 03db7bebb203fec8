//! # Crewboard API Server Library
//!
//! This library provides the HTTP surface for Crewboard: user accounts,
//! projects and project teams.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: Validated JSON request bodies
//! - `middleware`: Authentication and project guards
//! - `response`: Success envelope
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod response;
pub mod routes;

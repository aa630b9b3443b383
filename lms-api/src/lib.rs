//! # LMS API Server Library
//!
//! HTTP surface of the learning management backend: configuration, the
//! axum router, error mapping and route handlers. Domain rules live in
//! `lms-shared`.
//!
//! ## Modules
//!
//! - `app`: `AppState` and the router with its layers
//! - `config`: environment configuration
//! - `error`: `ApiError` and its JSON body
//! - `middleware`: actor resolution and security headers
//! - `routes`: one module per resource

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;

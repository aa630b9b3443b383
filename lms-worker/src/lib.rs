//! # LMS Worker Library
//!
//! Background job execution for the LMS. The API enqueues rows in the
//! `jobs` table; this crate claims and runs them.
//!
//! ## Modules
//!
//! - `config`: environment configuration
//! - `queue`: claiming, completion and retry bookkeeping on the `jobs` table
//! - `runner`: payload dispatch with an execution timeout
//! - `jobs`: the `notify_course_updated` and `deactivate_inactive_users` handlers
//! - `mailer`: mail transports
//! - `orchestrator`: the poll loop
//! - `scheduler`: daily deactivation enqueueing

pub mod config;
pub mod jobs;
pub mod mailer;
pub mod orchestrator;
pub mod queue;
pub mod runner;
pub mod scheduler;

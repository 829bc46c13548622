//! Core types and trait definitions for the clinic appointment engine.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.
//!
//! The pieces, leaves first:
//!
//! - [`authority`]: the pure transition table deciding who may move an
//!   appointment where, and who hears about it.
//! - [`store::ClinicStore`]: the persistence boundary (appointments with a
//!   conditional status write, plus the durable notification queue).
//! - [`channel::NotificationChannel`]: audience-scoped access to the queue.
//! - [`lifecycle::LifecycleController`]: orchestrates a transition request.
//! - [`feed`]: merges durable and ephemeral notifications for display.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod actor;
pub mod appointment;
pub mod authority;
pub mod channel;
pub mod error;
pub mod feed;
pub mod lifecycle;
pub mod notification;
pub mod store;

pub use error::{Error, Result};

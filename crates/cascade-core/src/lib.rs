//! Core types and trait definitions for the Cascade goal engine.
//!
//! Domain types, the permission and progress rules, the persistence and
//! event contracts, and [`GoalService`]. No HTTP or database code lives here.

// Trait impls use `async fn` against `impl Future + Send` signatures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod event;
pub mod goal;
pub mod notification;
pub mod permission;
pub mod progress;
pub mod service;
pub mod store;
pub mod user;

pub use error::{Error, Result};
pub use service::GoalService;

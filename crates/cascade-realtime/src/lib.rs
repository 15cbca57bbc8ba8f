//! Live per-user event channels for Cascade clients.
//!
//! A [`Broadcaster`] keeps every open channel for the life of the process
//! and relays [`cascade_core::event::Envelope`]s to them. Delivery is
//! at-least-once and best-effort: a user with no open channel simply misses
//! the event, and clients fall back to an authoritative read. Channels opened
//! with [`Broadcaster::open_channel`] also poll the store and send heartbeats.

mod broadcaster;
mod config;
mod driver;

pub use broadcaster::{Broadcaster, ChannelHandle, Subscription};
pub use config::RealtimeConfig;

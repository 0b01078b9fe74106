//! Headless internet radio player.
//!
//! onair plays a single live audio stream and keeps a "now playing" record
//! in sync with it:
//! * [`session`] composes everything into one start/stop lifecycle
//! * [`player`] owns the stream connection and reconnects when it drops
//! * [`poller`] polls the station's metadata on a fixed interval
//! * [`publisher`] fans updates out to [`observer`]s
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

#[macro_use]
extern crate log;

pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod metadata;
pub mod now_playing;
pub mod observer;
pub mod player;
pub mod poller;
pub mod publisher;
pub mod session;
pub mod session_id;
pub mod signal;
pub mod stream;
pub mod volume;

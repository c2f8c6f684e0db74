//! # Orbitals Game Library
//!
//! This library provides the server-side core of Orbitals, a two-team word
//! game. Each team has one hub who gives clues and one or more orbitals who
//! guess tiles on a shared board. The library handles seating players,
//! routing client messages into the table state machine, per-recipient
//! status broadcasts, and the turn countdown.
//!
//! The [`table::Table`] holds the game rules, the [`manager::TableManager`]
//! binds connections to players, and the [`server::TableServer`] drives both
//! from a tokio runtime.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::large_enum_variant)]

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

pub mod board;
pub mod config;
pub mod connections;
pub mod constants;
pub mod manager;
pub mod player;
pub mod server;
pub mod session;
pub mod table;
pub mod words;

pub use table::Status;

/// Every frame the server sends to a client
///
/// Frames are JSON objects tagged by a `type` field.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutgoingMessage {
    /// Direct reply to a request, with the recipient's view of the table
    Msg {
        /// Human-readable result
        msg: String,
        /// Snapshot after the request was handled
        status: Option<Status>,
    },
    /// Bare snapshot reply
    Status {
        /// Snapshot of the table
        status: Status,
    },
    /// Event pushed to every connection
    Broadcast {
        /// Human-readable description of the event
        msg: String,
        /// Snapshot after the event
        status: Status,
    },
    /// Countdown update while the turn timer runs
    Tick {
        /// Whole seconds left in the turn
        time_left: u64,
    },
}

impl OutgoingMessage {
    /// A reply with no snapshot attached
    pub fn notice(msg: impl Into<String>) -> Self {
        Self::Msg {
            msg: msg.into(),
            status: None,
        }
    }

    /// Converts the message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// Timed events fed back into the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// One step of the turn countdown
    Countdown {
        /// Timer generation this step belongs to
        epoch: u64,
        /// Time that will be left once this step fires
        remaining: web_time::Duration,
    },
}

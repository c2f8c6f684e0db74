//! Configuration constants for the Orbitals table
//!
//! This module contains the limits and defaults used throughout the
//! table, board, and timer so that every component agrees on the same
//! boundaries.

/// Table-wide limits
pub mod table {
    /// Default number of players allowed at the table
    pub const DEFAULT_PLAYER_LIMIT: usize = 8;
    /// Smallest player limit that seats a hub and an orbital on each team
    pub const MIN_PLAYER_LIMIT: usize = 4;
    /// Largest accepted player limit
    pub const MAX_PLAYER_LIMIT: usize = 32;
    /// Default number of players allowed on a single team
    pub const DEFAULT_TEAM_SIZE: usize = 4;
    /// Largest accepted team size
    pub const MAX_TEAM_SIZE: usize = 8;
}

/// Player name limits
pub mod names {
    /// Maximum length of a player name in bytes
    pub const MAX_LENGTH: usize = 30;
}

/// Board generation limits
pub mod board {
    /// Default number of tiles on a board
    pub const DEFAULT_TILE_COUNT: usize = 16;
    /// Smallest accepted board
    pub const MIN_TILE_COUNT: usize = 4;
    /// Largest accepted board
    pub const MAX_TILE_COUNT: usize = 64;
    /// Number of neutral tiles on a board large enough to hold them
    pub const NEUTRAL_TILES: usize = 3;
}

/// Turn timer limits
pub mod timer {
    /// Default turn time limit in seconds
    pub const DEFAULT_TIME_LIMIT: u64 = 60;
    /// Minimum turn time limit in seconds
    pub const MIN_TIME_LIMIT: u64 = 1;
    /// Maximum turn time limit in seconds
    pub const MAX_TIME_LIMIT: u64 = 600;
    /// Interval between countdown ticks in milliseconds
    pub const TICK_MILLIS: u64 = 1000;
}

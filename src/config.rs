//! Table configuration
//!
//! [`Options`] collects the knobs a server operator can turn when creating a
//! table. It is deserializable so it can come from any config source, and it
//! is validated with `garde` before a table accepts it.

use std::time::Duration;

use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::constants;

/// Validates that an optional turn time limit falls within the allowed bounds
fn validate_time_limit(val: &Option<Duration>, _ctx: &()) -> garde::Result {
    let Some(val) = val else {
        return Ok(());
    };

    let bounds = constants::timer::MIN_TIME_LIMIT..=constants::timer::MAX_TIME_LIMIT;
    if bounds.contains(&val.as_secs()) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "time_limit is outside of the bounds [{},{}]",
            bounds.start(),
            bounds.end()
        )))
    }
}

/// Configuration options for a single table
#[serde_with::serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Options {
    /// Maximum number of players seated at the table
    #[garde(range(
        min = constants::table::MIN_PLAYER_LIMIT,
        max = constants::table::MAX_PLAYER_LIMIT
    ))]
    pub player_limit: usize,
    /// Maximum number of players on one team
    #[garde(range(min = 1, max = constants::table::MAX_TEAM_SIZE))]
    pub team_size: usize,
    /// Number of tiles dealt per round
    #[garde(range(
        min = constants::board::MIN_TILE_COUNT,
        max = constants::board::MAX_TILE_COUNT
    ))]
    pub tile_count: usize,
    /// Turn time limit, `None` disables the turn timer
    #[garde(custom(validate_time_limit))]
    #[serde_as(as = "Option<serde_with::DurationSeconds<u64>>")]
    pub time_limit: Option<Duration>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            player_limit: constants::table::DEFAULT_PLAYER_LIMIT,
            team_size: constants::table::DEFAULT_TEAM_SIZE,
            tile_count: constants::board::DEFAULT_TILE_COUNT,
            time_limit: Some(Duration::from_secs(constants::timer::DEFAULT_TIME_LIMIT)),
        }
    }
}

impl Options {
    /// Returns a copy of these options with the turn timer disabled
    pub fn without_timer(self) -> Self {
        Self {
            time_limit: None,
            ..self
        }
    }

    /// Returns a copy of these options with a different player limit
    pub fn with_player_limit(self, player_limit: usize) -> Self {
        Self {
            player_limit,
            ..self
        }
    }
}

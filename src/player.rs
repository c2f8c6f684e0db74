//! Seated players and their roles

use serde::{Deserialize, Serialize};

use crate::board::Team;

/// The part a player plays for their team
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Guesses tiles from the hub's clues
    #[default]
    #[display("orbital")]
    Orbital,
    /// Gives clues and approves the other team's clues
    #[display("hub")]
    Hub,
}

/// A player seated at the table, keyed by their unique name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    name: String,
    team: Option<Team>,
    role: Role,
    replay_ready: bool,
}

impl Player {
    /// Creates a player with no team, the orbital role, and no replay vote
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            team: None,
            role: Role::default(),
            replay_ready: false,
        }
    }

    /// The player's unique display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The team the player belongs to, if any
    pub fn team(&self) -> Option<Team> {
        self.team
    }

    /// The player's role
    pub fn role(&self) -> Role {
        self.role
    }

    /// Whether the player is their team's hub
    pub fn is_hub(&self) -> bool {
        self.role == Role::Hub
    }

    /// Whether the player asked to play another round
    pub fn replay_ready(&self) -> bool {
        self.replay_ready
    }

    /// Moves the player to `team`; changing teams always drops the hub role
    pub(crate) fn join_team(&mut self, team: Team) {
        if self.team != Some(team) {
            self.team = Some(team);
            self.role = Role::Orbital;
            self.replay_ready = false;
        }
    }

    pub(crate) fn set_role(&mut self, role: Role) {
        self.role = role;
    }

    pub(crate) fn set_replay_ready(&mut self, ready: bool) {
        self.replay_ready = ready;
    }

    /// Whether the player is on `team` with the given role
    pub fn fills(&self, team: Team, role: Role) -> bool {
        self.team == Some(team) && self.role == role
    }
}

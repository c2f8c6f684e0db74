//! Tile board for a single round
//!
//! The board deals the word tiles, assigns each one to a team (or leaves it
//! neutral), and tracks which tiles have been exposed. It knows nothing about
//! players or turns. The client-facing projection [`Board::view`] only
//! reveals the owner of exposed tiles.

use enum_map::Enum;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{constants, words::WordPool};

/// One of the two competing teams
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Enum,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    /// The blue team
    #[display("blue")]
    Blue,
    /// The orange team
    #[display("orange")]
    Orange,
}

impl Team {
    /// Returns the opposing team
    pub fn other(self) -> Self {
        match self {
            Team::Blue => Team::Orange,
            Team::Orange => Team::Blue,
        }
    }

    /// Picks a team with a fair coin flip
    pub fn coin_flip() -> Self {
        if fastrand::bool() {
            Team::Blue
        } else {
            Team::Orange
        }
    }
}

/// A single word tile
///
/// `owner` is `None` for neutral tiles. `exposed` only ever goes from
/// `false` to `true`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    word: String,
    owner: Option<Team>,
    exposed: bool,
}

impl Tile {
    fn new(word: impl Into<String>, owner: Option<Team>) -> Self {
        Self {
            word: word.into(),
            owner,
            exposed: false,
        }
    }

    /// The word printed on the tile
    pub fn word(&self) -> &str {
        &self.word
    }

    /// Whether the tile has been guessed
    pub fn is_exposed(&self) -> bool {
        self.exposed
    }

    /// The owning team, `None` for a neutral tile
    ///
    /// Never send this to clients for a hidden tile.
    pub fn owner(&self) -> Option<Team> {
        self.owner
    }

    /// What a client is allowed to see about the tile's owner
    ///
    /// Hidden tiles are blank; exposed tiles show their team or `neutral`.
    pub fn label(&self) -> String {
        match (self.exposed, self.owner) {
            (false, _) => String::new(),
            (true, Some(team)) => team.to_string(),
            (true, None) => "neutral".to_owned(),
        }
    }
}

/// Errors that can occur when dealing or flipping tiles
#[derive(Error, Serialize, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The word pool cannot fill a board of the requested size
    #[error("word pool has {available} words but {required} tiles are needed")]
    PoolTooSmall {
        /// Number of distinct words in the pool
        available: usize,
        /// Number of tiles the board deals
        required: usize,
    },
    /// The word is not on the current board
    #[error("{0} is not on the board")]
    NotFound(String),
    /// The tile was already exposed by an earlier guess
    #[error("{0} has already been exposed")]
    AlreadyExposed(String),
}

/// Where a board gets its tiles from each round
#[derive(Debug, Clone)]
enum Deal {
    /// Draw fresh words and owners at random
    Random { pool: WordPool, tile_count: usize },
    /// Re-deal the same fixed layout every round
    Preset {
        layout: Vec<(String, Option<Team>)>,
        first_turn: Team,
    },
}

/// The tile set for the current round
#[derive(Debug, Clone)]
pub struct Board {
    deal: Deal,
    tiles: Vec<Tile>,
    first_turn: Option<Team>,
}

impl Board {
    /// Creates a board that deals `tile_count` random tiles from `pool`
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolTooSmall`] if the pool has fewer distinct words
    /// than the board needs.
    pub fn new(pool: WordPool, tile_count: usize) -> Result<Self, Error> {
        check_pool(&pool, tile_count)?;
        Ok(Self {
            deal: Deal::Random { pool, tile_count },
            tiles: Vec::new(),
            first_turn: None,
        })
    }

    /// Creates a board that deals the same layout every round
    ///
    /// Duplicate words keep their first occurrence.
    pub fn preset<I, S>(layout: I, first_turn: Team) -> Self
    where
        I: IntoIterator<Item = (S, Option<Team>)>,
        S: Into<String>,
    {
        Self {
            deal: Deal::Preset {
                layout: layout
                    .into_iter()
                    .map(|(word, owner)| (word.into(), owner))
                    .unique_by(|(word, _)| word.clone())
                    .collect(),
                first_turn,
            },
            tiles: Vec::new(),
            first_turn: None,
        }
    }

    /// Number of tiles dealt each round
    pub fn tile_count(&self) -> usize {
        match &self.deal {
            Deal::Random { tile_count, .. } => *tile_count,
            Deal::Preset { layout, .. } => layout.len(),
        }
    }

    /// Replaces the tile set with a freshly dealt one
    ///
    /// Random boards draw distinct words uniformly, then alternate ownership
    /// starting from a coin-flip team. The last few tiles of the alternation
    /// are left neutral (three on any board with room for them). The team
    /// that received the first tile also gets the first turn.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolTooSmall`] if the pool cannot fill the board.
    pub fn generate_tiles(&mut self) -> Result<(), Error> {
        match &self.deal {
            Deal::Random { pool, tile_count } => {
                let tile_count = *tile_count;
                check_pool(pool, tile_count)?;

                let mut words = fastrand::choose_multiple(pool.iter(), tile_count);
                fastrand::shuffle(&mut words);

                let first = Team::coin_flip();
                let owned = tile_count - neutral_count(tile_count);

                let mut tiles = words
                    .into_iter()
                    .enumerate()
                    .map(|(i, word)| {
                        let owner = match i {
                            i if i >= owned => None,
                            i if i % 2 == 0 => Some(first),
                            _ => Some(first.other()),
                        };
                        Tile::new(word, owner)
                    })
                    .collect_vec();
                fastrand::shuffle(&mut tiles);

                self.tiles = tiles;
                self.first_turn = Some(first);
            }
            Deal::Preset { layout, first_turn } => {
                self.tiles = layout
                    .iter()
                    .map(|(word, owner)| Tile::new(word.as_str(), *owner))
                    .collect();
                self.first_turn = Some(*first_turn);
            }
        }

        Ok(())
    }

    /// Team that owns the extra tile and therefore plays first
    pub fn first_turn(&self) -> Option<Team> {
        self.first_turn
    }

    /// Exposes the tile carrying `word` and returns its owner
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the word is not on the board, or
    /// [`Error::AlreadyExposed`] if it was flipped before.
    pub fn flip_tile(&mut self, word: &str) -> Result<Option<Team>, Error> {
        let tile = self
            .tiles
            .iter_mut()
            .find(|tile| tile.word == word)
            .ok_or_else(|| Error::NotFound(word.to_owned()))?;

        if tile.exposed {
            return Err(Error::AlreadyExposed(word.to_owned()));
        }

        tile.exposed = true;
        Ok(tile.owner)
    }

    /// Looks up the tile carrying `word`
    pub fn tile(&self, word: &str) -> Option<&Tile> {
        self.tiles.iter().find(|tile| tile.word == word)
    }

    /// Number of hidden tiles owned by `team`
    pub fn tiles_left(&self, team: Team) -> usize {
        self.tiles
            .iter()
            .filter(|tile| tile.owner == Some(team) && !tile.exposed)
            .count()
    }

    /// Total number of tiles owned by `team`, exposed or not
    pub fn team_total(&self, team: Team) -> usize {
        self.tiles
            .iter()
            .filter(|tile| tile.owner == Some(team))
            .count()
    }

    /// The team whose tiles are all exposed, if any
    pub fn winner(&self) -> Option<Team> {
        [Team::Blue, Team::Orange]
            .into_iter()
            .find(|&team| self.team_total(team) > 0 && self.tiles_left(team) == 0)
    }

    /// Client-safe projection of the board in deal order
    ///
    /// Each entry is the word and its [`Tile::label`].
    pub fn view(&self) -> Vec<(String, String)> {
        self.tiles
            .iter()
            .map(|tile| (tile.word.clone(), tile.label()))
            .collect()
    }

    /// All tiles in deal order
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }
}

/// Number of neutral tiles on a board of `tile_count` tiles
fn neutral_count(tile_count: usize) -> usize {
    constants::board::NEUTRAL_TILES.min(tile_count.saturating_sub(2))
}

fn check_pool(pool: &WordPool, tile_count: usize) -> Result<(), Error> {
    if pool.len() < tile_count {
        Err(Error::PoolTooSmall {
            available: pool.len(),
            required: tile_count,
        })
    } else {
        Ok(())
    }
}

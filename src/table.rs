//! Table state machine
//!
//! The [`Table`] is the authoritative game state: who is seated, which team
//! and role each player holds, whose turn it is, the live clue and guess
//! budget, the turn timer, and the board for the current round.
//!
//! Every mutator either applies completely and returns `Ok`, or returns a
//! [`Rejection`] and leaves the table untouched. Rejections are ordinary
//! game-flow results meant to be shown to the player, not failures.

use std::{collections::BTreeMap, time::Duration};

use enum_map::EnumMap;
use garde::Validate;
use log::{debug, error, info};
use serde::Serialize;
use serde_with::{NoneAsEmptyString, skip_serializing_none};
use thiserror::Error;

use crate::{
    board::{self, Board, Team},
    config::Options,
    constants,
    player::{Player, Role},
    words::WordPool,
};

/// The phase the table is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, derive_more::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameState {
    /// Teams or roles are incomplete
    #[display("WAITING_PLAYERS")]
    WaitingPlayers,
    /// Rosters are complete, waiting for both hubs to request a start
    #[display("WAITING_START")]
    WaitingStart,
    /// The active hub must submit a clue
    #[display("WAITING_CLUE")]
    WaitingClue,
    /// The opposing hub must approve or reject the clue
    #[display("WAITING_APPROVAL")]
    WaitingApproval,
    /// The active orbitals are guessing
    #[display("WAITING_GUESS")]
    WaitingGuess,
    /// A team has exposed all of its tiles
    #[display("GAME_OVER")]
    GameOver,
}

impl GameState {
    /// Whether teams and roles may still change
    pub fn is_lobby(self) -> bool {
        matches!(self, GameState::WaitingPlayers | GameState::WaitingStart)
    }
}

/// Reasons a player request is refused
///
/// The display text is the exact reason sent back to the client.
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The table is full
    #[error("player limit has been reached")]
    PlayerLimit,
    /// Another player already uses the name
    #[error("player name exists")]
    NameExists,
    /// The name is empty or only whitespace
    #[error("player name cannot be empty")]
    NameEmpty,
    /// The name exceeds the length limit
    #[error("player name is too long")]
    NameTooLong,
    /// The connection is already bound to a player
    #[error("player has an existing name")]
    NameAssigned,
    /// No player with this name is seated
    #[error("player is not at the table")]
    UnknownPlayer,
    /// Teams are frozen once a game is in progress
    #[error("team changes are only allowed in WAITING_PLAYERS and WAITING_START states")]
    TeamLocked,
    /// The requested team already has its full roster
    #[error("team is full")]
    TeamFull,
    /// Roles require a team
    #[error("player must belong to team to request role")]
    NoTeam,
    /// Roles are frozen once a game is in progress
    #[error("role changes are only allowed in WAITING_PLAYERS and WAITING_START states")]
    RoleLocked,
    /// A teammate already holds the hub role
    #[error("hub role not available")]
    HubTaken,
    /// At least one team has no hub
    #[error("hub roles are not filled")]
    HubsMissing,
    /// At least one team has no orbital
    #[error("orbital roles are not filled")]
    OrbitalsMissing,
    /// Only hubs may start a game
    #[error("only hub roles can request start")]
    StartByOrbital,
    /// A game is already running or just finished
    #[error("not awaiting start requests")]
    NotAwaitingStart,
    /// The board could not be dealt
    #[error("board could not be dealt")]
    BoardUnavailable,
    /// Clues are only accepted in `WAITING_CLUE`
    #[error("not awaiting clues, state: {0}")]
    NotAwaitingClues(GameState),
    /// The player's team is not the one being asked
    #[error("it is the other team's turn")]
    OtherTeamsTurn,
    /// Only the active hub gives clues
    #[error("only hub can submit clues")]
    ClueByOrbital,
    /// The clue text is blank
    #[error("clue cannot be empty")]
    EmptyClue,
    /// A clue must allow at least one guess
    #[error("guess count must be at least 1")]
    ZeroGuesses,
    /// Clue responses are only accepted in `WAITING_APPROVAL`
    #[error("not awaiting clue responses")]
    NotAwaitingResponses,
    /// Only the opposing hub approves clues
    #[error("only hub can respond to clues")]
    ResponseByOrbital,
    /// Guesses are only accepted in `WAITING_GUESS`
    #[error("not awaiting guesses")]
    NotAwaitingGuesses,
    /// Hubs know the board and cannot guess
    #[error("hubs cannot submit guesses")]
    GuessByHub,
    /// The guessed word is not a tile
    #[error("guess is not on the board")]
    NotOnBoard,
    /// The guessed tile is already face up
    #[error("tile has already been exposed")]
    AlreadyExposed,
    /// Hubs cannot end their orbitals' turn
    #[error("hubs cannot end the turn")]
    EndTurnByHub,
    /// Replay votes are only collected after a game ends
    #[error("not awaiting replay requests")]
    NotAwaitingReplay,
}

/// Errors that prevent a table from being created
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The options failed validation
    #[error("invalid table options: {0}")]
    Options(#[from] garde::Report),
    /// The board cannot be dealt with the given words
    #[error(transparent)]
    Board(#[from] board::Error),
}

/// Result of a successful start request
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum StartOutcome {
    /// The requesting team is ready, the other is not yet
    #[display("waiting for the other team")]
    Waiting,
    /// Both teams were ready and a new round began
    #[display("game has started")]
    Started,
}

/// Result of a successful clue response
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum ClueResponse {
    /// The clue stands and guessing begins
    #[display("clue was accepted")]
    Accepted,
    /// The clue was thrown out and the hub must give another
    #[display("clue was rejected")]
    Rejected,
}

/// Result of a successful guess or of ending the turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum GuessOutcome {
    /// The guessing team may keep going
    #[display("guess accepted")]
    Continue,
    /// The budget ran out and the other team plays next
    #[display("turn is over")]
    TurnOver,
    /// The guess exposed the last tile of a team
    #[display("{_0} team wins")]
    GameOver(Team),
}

/// Result of a successful replay request
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Replay {
    /// The vote was counted, others have not voted yet
    #[display("request accepted")]
    Waiting,
    /// Everyone voted and the table is back to `WAITING_START`
    #[display("all players are ready to play again")]
    Restarted,
}

/// What happened to the table when a player left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// Nothing beyond the removal
    Left,
    /// The roster broke and the table fell back to `WAITING_PLAYERS`
    GameReset,
    /// The departed player was the last replay holdout
    ReplayStarted,
}

/// What a turn timeout did
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Timeout {
    /// The pending clue was approved by default
    #[display("time is up, clue was accepted")]
    ClueAccepted,
    /// The turn passed to the given team
    #[display("time is up, {_0} team plays")]
    TurnPassed(Team),
}

/// The countdown shared by the clue, approval, and guess phases
///
/// Every restart or stop bumps `epoch`; countdown events carrying an older
/// epoch are ignored, so a superseded timer can never fire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnTimer {
    epoch: u64,
    running: bool,
    time_left: Duration,
}

impl TurnTimer {
    /// Generation of the current countdown
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether a countdown is in progress
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Time remaining on the current countdown
    pub fn time_left(&self) -> Duration {
        self.time_left
    }

    /// Remaining whole seconds, rounded up, while running
    pub fn seconds_left(&self) -> Option<u64> {
        self.running
            .then(|| self.time_left.as_millis().div_ceil(1000) as u64)
    }
}

/// Serializable snapshot of the table
///
/// `clue` and `guesses_left` are only filled in for recipients entitled to
/// see the live clue.
#[serde_with::serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Status {
    /// Maximum number of players
    pub player_limit: usize,
    /// Number of seated players
    pub player_count: usize,
    /// Free seats
    pub spots_available: usize,
    /// Current phase
    pub game_state: GameState,
    /// Team whose turn it is, blank outside a round
    #[serialize_always]
    #[serde_as(as = "NoneAsEmptyString")]
    pub current_turn: Option<Team>,
    /// Word to owner label, blank while hidden
    #[serde_as(as = "serde_with::Map<_, _>")]
    pub tiles: Vec<(String, String)>,
    /// Hidden tiles per team
    pub tiles_left: EnumMap<Team, usize>,
    /// Name to `[team, role, replay_ready]`
    #[serde_as(as = "BTreeMap<_, (NoneAsEmptyString, _, _)>")]
    pub players: BTreeMap<String, (Option<Team>, Role, bool)>,
    /// Winning team, blank until a game ends
    #[serialize_always]
    #[serde_as(as = "NoneAsEmptyString")]
    pub winner: Option<Team>,
    /// Which hubs have asked to start
    pub start_ready: EnumMap<Team, bool>,
    /// Configured turn length
    #[serde_as(as = "Option<serde_with::DurationSeconds<u64>>")]
    pub time_limit: Option<Duration>,
    /// Seconds left on the running countdown
    pub time_left: Option<u64>,
    /// The live clue, for privileged recipients only
    pub clue: Option<String>,
    /// The remaining guess budget, for privileged recipients only
    pub guesses_left: Option<usize>,
}

impl Status {
    /// Adds the live clue and guess budget to the snapshot
    pub fn reveal_clue(self, clue: &str, guesses_left: usize) -> Self {
        Self {
            clue: Some(clue.to_owned()),
            guesses_left: Some(guesses_left),
            ..self
        }
    }
}

/// The game table
#[derive(Debug)]
pub struct Table {
    options: Options,
    players: BTreeMap<String, Player>,
    state: GameState,
    current_turn: Option<Team>,
    current_clue: String,
    guess_budget: usize,
    winner: Option<Team>,
    start_ready: EnumMap<Team, bool>,
    board: Board,
    timer: TurnTimer,
}

// Construction and queries
impl Table {
    /// Creates an empty table that deals from `board`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Options`] if the options fail validation.
    pub fn new(options: Options, board: Board) -> Result<Self, ConfigError> {
        options.validate()?;

        Ok(Self {
            options,
            players: BTreeMap::new(),
            state: GameState::WaitingPlayers,
            current_turn: None,
            current_clue: String::new(),
            guess_budget: 0,
            winner: None,
            start_ready: EnumMap::default(),
            board,
            timer: TurnTimer::default(),
        })
    }

    /// Creates an empty table that deals random boards from `pool`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the options are invalid or the pool holds
    /// fewer words than `options.tile_count`.
    pub fn with_word_pool(options: Options, pool: WordPool) -> Result<Self, ConfigError> {
        let board = Board::new(pool, options.tile_count)?;
        Self::new(options, board)
    }

    /// The options this table was created with
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Current phase
    pub fn state(&self) -> GameState {
        self.state
    }

    /// Team whose turn it is
    pub fn current_turn(&self) -> Option<Team> {
        self.current_turn
    }

    /// The live clue text, empty when there is none
    pub fn current_clue(&self) -> &str {
        &self.current_clue
    }

    /// Guesses left in the current turn
    pub fn guess_budget(&self) -> usize {
        self.guess_budget
    }

    /// Winning team of the last game
    pub fn winner(&self) -> Option<Team> {
        self.winner
    }

    /// Looks up a seated player
    pub fn player(&self, name: &str) -> Option<&Player> {
        self.players.get(name)
    }

    /// All seated players ordered by name
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// The board for the current round
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// The turn timer
    pub fn timer(&self) -> TurnTimer {
        self.timer
    }

    /// The opposing hub who must approve the current clue
    ///
    /// `None` outside a round or if that team has no hub.
    pub fn approver(&self) -> Option<&str> {
        let approving = self.current_turn?.other();
        self.players
            .values()
            .find(|player| player.fills(approving, Role::Hub))
            .map(Player::name)
    }

    /// Snapshot of the table without the live clue
    pub fn status(&self) -> Status {
        Status {
            player_limit: self.options.player_limit,
            player_count: self.players.len(),
            spots_available: self.options.player_limit.saturating_sub(self.players.len()),
            game_state: self.state,
            current_turn: self.current_turn,
            tiles: self.board.view(),
            tiles_left: EnumMap::from_fn(|team| self.board.tiles_left(team)),
            players: self
                .players
                .values()
                .map(|p| {
                    (
                        p.name().to_owned(),
                        (p.team(), p.role(), p.replay_ready()),
                    )
                })
                .collect(),
            winner: self.winner,
            start_ready: self.start_ready,
            time_limit: self.options.time_limit,
            time_left: self.timer.seconds_left(),
            clue: None,
            guesses_left: None,
        }
    }

    fn seated(&self, name: &str) -> Result<&Player, Rejection> {
        self.players.get(name).ok_or(Rejection::UnknownPlayer)
    }

    fn has(&self, team: Team, role: Role) -> bool {
        self.players.values().any(|player| player.fills(team, role))
    }

    fn count(&self, team: Team, role: Role) -> usize {
        self.players
            .values()
            .filter(|player| player.fills(team, role))
            .count()
    }

    fn roster_complete(&self) -> bool {
        [Team::Blue, Team::Orange]
            .into_iter()
            .all(|team| self.has(team, Role::Hub) && self.has(team, Role::Orbital))
    }
}

// Lobby
impl Table {
    /// Seats a new player with no team and the orbital role
    ///
    /// The name is trimmed; the trimmed name is returned and becomes the
    /// player's identity.
    ///
    /// # Errors
    ///
    /// Returns [`Rejection::PlayerLimit`] when the table is full,
    /// [`Rejection::NameExists`] for a duplicate name, or one of the name
    /// validation rejections.
    pub fn player_joins(&mut self, name: &str) -> Result<String, Rejection> {
        if self.players.len() >= self.options.player_limit {
            return Err(Rejection::PlayerLimit);
        }
        let name = rustrict::trim_whitespace(name);
        if name.is_empty() {
            return Err(Rejection::NameEmpty);
        }
        if name.len() > constants::names::MAX_LENGTH {
            return Err(Rejection::NameTooLong);
        }
        if self.players.contains_key(name) {
            return Err(Rejection::NameExists);
        }

        self.players.insert(name.to_owned(), Player::new(name));
        info!("{name} joined the table");

        Ok(name.to_owned())
    }

    /// Removes a player
    ///
    /// If a game is under way (any state past `WAITING_PLAYERS`) and the
    /// player was a hub, or the last orbital of their team, the table falls
    /// back to `WAITING_PLAYERS` and the round is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`Rejection::UnknownPlayer`] if no such player is seated.
    pub fn player_leaves(&mut self, name: &str) -> Result<Departure, Rejection> {
        let player = self.seated(name)?;
        let critical = match player.team() {
            Some(team) => player.is_hub() || self.count(team, Role::Orbital) == 1,
            None => false,
        };

        self.players.remove(name);
        info!("{name} left the table");

        if critical && self.state != GameState::WaitingPlayers {
            self.reset_to_waiting_players();
            return Ok(Departure::GameReset);
        }

        if self.check_replay() {
            return Ok(Departure::ReplayStarted);
        }

        Ok(Departure::Left)
    }

    /// Moves a player to a team
    ///
    /// A hub switching teams becomes an orbital on the new team.
    ///
    /// # Errors
    ///
    /// Returns [`Rejection::TeamLocked`] once a game is in progress or
    /// [`Rejection::TeamFull`] if the team roster is complete.
    pub fn team_request(&mut self, name: &str, team: Team) -> Result<(), Rejection> {
        let player = self.seated(name)?;
        if !self.state.is_lobby() {
            return Err(Rejection::TeamLocked);
        }
        if player.team() == Some(team) {
            return Ok(());
        }
        let roster = self
            .players
            .values()
            .filter(|player| player.team() == Some(team))
            .count();
        if roster >= self.options.team_size {
            return Err(Rejection::TeamFull);
        }

        if let Some(player) = self.players.get_mut(name) {
            player.join_team(team);
        }
        self.roster_update();

        Ok(())
    }

    /// Assigns a role to a player on a team
    ///
    /// # Errors
    ///
    /// Returns [`Rejection::NoTeam`], [`Rejection::RoleLocked`] once a game is
    /// in progress, or [`Rejection::HubTaken`] if a teammate is already hub.
    pub fn role_request(&mut self, name: &str, role: Role) -> Result<(), Rejection> {
        let player = self.seated(name)?;
        let Some(team) = player.team() else {
            return Err(Rejection::NoTeam);
        };
        if !self.state.is_lobby() {
            return Err(Rejection::RoleLocked);
        }
        if role == Role::Hub
            && self
                .players
                .values()
                .any(|other| other.name() != name && other.fills(team, Role::Hub))
        {
            return Err(Rejection::HubTaken);
        }

        if let Some(player) = self.players.get_mut(name) {
            player.set_role(role);
        }
        self.roster_update();

        Ok(())
    }

    /// Marks the hub's team as ready; starts a round once both are
    ///
    /// # Errors
    ///
    /// Returns [`Rejection::HubsMissing`] or [`Rejection::OrbitalsMissing`]
    /// while rosters are incomplete, [`Rejection::StartByOrbital`] for
    /// non-hubs, and [`Rejection::NotAwaitingStart`] outside `WAITING_START`.
    pub fn start_request(&mut self, name: &str) -> Result<StartOutcome, Rejection> {
        let player = self.seated(name)?;
        if !(self.has(Team::Blue, Role::Hub) && self.has(Team::Orange, Role::Hub)) {
            return Err(Rejection::HubsMissing);
        }
        if !(self.has(Team::Blue, Role::Orbital) && self.has(Team::Orange, Role::Orbital)) {
            return Err(Rejection::OrbitalsMissing);
        }
        let (true, Some(team)) = (player.is_hub(), player.team()) else {
            return Err(Rejection::StartByOrbital);
        };
        if self.state != GameState::WaitingStart {
            return Err(Rejection::NotAwaitingStart);
        }

        self.start_ready[team] = true;
        debug!("{team} team is ready to start");

        if self.start_ready.values().all(|ready| *ready) {
            self.start_new_game()?;
            Ok(StartOutcome::Started)
        } else {
            Ok(StartOutcome::Waiting)
        }
    }

    /// Deals a new board and hands the first turn to the board's first team
    fn start_new_game(&mut self) -> Result<(), Rejection> {
        self.start_ready = EnumMap::default();

        if let Err(e) = self.board.generate_tiles() {
            error!("failed to deal a board: {e}");
            return Err(Rejection::BoardUnavailable);
        }

        self.current_turn = self.board.first_turn();
        self.current_clue.clear();
        self.guess_budget = 0;
        self.winner = None;
        for player in self.players.values_mut() {
            player.set_replay_ready(false);
        }
        self.state = GameState::WaitingClue;
        self.restart_timer();

        info!(
            "new game started, {} team plays first",
            self.current_turn.map(|t| t.to_string()).unwrap_or_default()
        );

        Ok(())
    }

    fn roster_update(&mut self) {
        if self.roster_complete() {
            self.state = GameState::WaitingStart;
        } else {
            self.state = GameState::WaitingPlayers;
            self.start_ready = EnumMap::default();
        }
        debug!("roster updated, state: {}", self.state);
    }

    fn reset_to_waiting_players(&mut self) {
        self.state = GameState::WaitingPlayers;
        self.start_ready = EnumMap::default();
        self.current_turn = None;
        self.current_clue.clear();
        self.guess_budget = 0;
        self.winner = None;
        for player in self.players.values_mut() {
            player.set_replay_ready(false);
        }
        self.stop_timer();
        info!("roster broken, table is waiting for players");
    }

    /// Removes every player and returns to the initial state
    pub fn clear(&mut self) {
        self.players.clear();
        self.reset_to_waiting_players();
    }
}

// Rounds
impl Table {
    /// Submits a clue for the active team
    ///
    /// The guess budget is capped at the number of the team's hidden tiles.
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] if the table is not waiting for a clue, the
    /// player is not the active team's hub, or the clue is malformed.
    pub fn new_clue(&mut self, name: &str, clue: &str, count: usize) -> Result<(), Rejection> {
        let player = self.seated(name)?;
        if self.state != GameState::WaitingClue {
            return Err(Rejection::NotAwaitingClues(self.state));
        }
        let Some(turn) = self.current_turn.filter(|&turn| player.team() == Some(turn)) else {
            return Err(Rejection::OtherTeamsTurn);
        };
        if !player.is_hub() {
            return Err(Rejection::ClueByOrbital);
        }
        let clue = clue.trim();
        if clue.is_empty() {
            return Err(Rejection::EmptyClue);
        }
        if count == 0 {
            return Err(Rejection::ZeroGuesses);
        }

        self.current_clue = clue.to_owned();
        self.guess_budget = count.min(self.board.tiles_left(turn));
        self.state = GameState::WaitingApproval;
        self.restart_timer();
        debug!("{turn} clue {clue:?} for {} guesses", self.guess_budget);

        Ok(())
    }

    /// Approves or rejects the pending clue
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] unless the table is waiting for approval and
    /// the player is the opposing team's hub.
    pub fn clue_response(&mut self, name: &str, approve: bool) -> Result<ClueResponse, Rejection> {
        let player = self.seated(name)?;
        if self.state != GameState::WaitingApproval {
            return Err(Rejection::NotAwaitingResponses);
        }
        if player.team().is_some() && player.team() == self.current_turn {
            return Err(Rejection::OtherTeamsTurn);
        }
        if !player.is_hub() {
            return Err(Rejection::ResponseByOrbital);
        }

        let response = if approve {
            self.state = GameState::WaitingGuess;
            ClueResponse::Accepted
        } else {
            self.state = GameState::WaitingClue;
            self.current_clue.clear();
            self.guess_budget = 0;
            ClueResponse::Rejected
        };
        self.restart_timer();
        debug!("{response}, state: {}", self.state);

        Ok(response)
    }

    /// Exposes a tile for the active team
    ///
    /// A wrong-team or neutral tile ends the turn. Exposing the last tile of
    /// either team ends the game in that team's favour.
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] unless the table is waiting for guesses, the
    /// player is an orbital on the active team, and the word is a hidden tile.
    pub fn new_guess(&mut self, name: &str, word: &str) -> Result<GuessOutcome, Rejection> {
        let turn = self.active_orbital(name, Rejection::GuessByHub)?;

        let owner = match self.board.flip_tile(word.trim()) {
            Ok(owner) => owner,
            Err(board::Error::NotFound(_)) => return Err(Rejection::NotOnBoard),
            Err(board::Error::AlreadyExposed(_)) => return Err(Rejection::AlreadyExposed),
            Err(board::Error::PoolTooSmall { .. }) => return Err(Rejection::BoardUnavailable),
        };
        debug!("{name} exposed {word}");

        if let Some(winner) = self.board.winner() {
            self.finish_game(winner);
            return Ok(GuessOutcome::GameOver(winner));
        }

        if owner != Some(turn) {
            self.guess_budget = 1;
        }
        self.guess_budget = self.guess_budget.saturating_sub(1);

        if self.guess_budget == 0 {
            self.pass_turn();
            Ok(GuessOutcome::TurnOver)
        } else {
            Ok(GuessOutcome::Continue)
        }
    }

    /// Gives up the remaining guesses and passes the turn
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] unless the player is an orbital on the team
    /// currently guessing.
    pub fn end_turn(&mut self, name: &str) -> Result<(), Rejection> {
        self.active_orbital(name, Rejection::EndTurnByHub)?;
        self.guess_budget = 0;
        self.pass_turn();
        Ok(())
    }

    /// Records a vote to play again
    ///
    /// # Errors
    ///
    /// Returns [`Rejection::NotAwaitingReplay`] unless the game is over.
    pub fn replay_request(&mut self, name: &str) -> Result<Replay, Rejection> {
        self.seated(name)?;
        if self.state != GameState::GameOver {
            return Err(Rejection::NotAwaitingReplay);
        }

        if let Some(player) = self.players.get_mut(name) {
            player.set_replay_ready(true);
        }

        if self.check_replay() {
            Ok(Replay::Restarted)
        } else {
            Ok(Replay::Waiting)
        }
    }

    /// Checks the guessing preconditions shared by guesses and ending the turn
    fn active_orbital(&self, name: &str, hub_rejection: Rejection) -> Result<Team, Rejection> {
        let player = self.seated(name)?;
        if self.state != GameState::WaitingGuess {
            return Err(Rejection::NotAwaitingGuesses);
        }
        let Some(turn) = self.current_turn.filter(|&turn| player.team() == Some(turn)) else {
            return Err(Rejection::OtherTeamsTurn);
        };
        if player.is_hub() {
            return Err(hub_rejection);
        }
        Ok(turn)
    }

    fn pass_turn(&mut self) {
        self.current_turn = self.current_turn.map(Team::other);
        self.current_clue.clear();
        self.guess_budget = 0;
        self.state = GameState::WaitingClue;
        self.restart_timer();
        debug!(
            "turn passes to {}",
            self.current_turn.map(|t| t.to_string()).unwrap_or_default()
        );
    }

    fn finish_game(&mut self, winner: Team) {
        self.winner = Some(winner);
        self.state = GameState::GameOver;
        self.current_turn = None;
        self.current_clue.clear();
        self.guess_budget = 0;
        self.stop_timer();
        info!("game over, {winner} team wins");
    }

    /// Returns to `WAITING_START` once every seated player voted to replay
    fn check_replay(&mut self) -> bool {
        let everyone_ready = !self.players.is_empty()
            && self.players.values().all(Player::replay_ready);
        if self.state != GameState::GameOver || !everyone_ready {
            return false;
        }

        self.state = GameState::WaitingStart;
        self.winner = None;
        self.current_clue.clear();
        self.guess_budget = 0;
        self.start_ready = EnumMap::default();
        for player in self.players.values_mut() {
            player.set_replay_ready(false);
        }
        info!("all players are ready to play again");

        true
    }
}

// Timer
impl Table {
    /// Starts a fresh countdown, or just invalidates the old one when the
    /// timer is disabled
    fn restart_timer(&mut self) {
        self.timer = TurnTimer {
            epoch: self.timer.epoch + 1,
            running: self.options.time_limit.is_some(),
            time_left: self.options.time_limit.unwrap_or_default(),
        };
    }

    /// Invalidates any running countdown
    pub fn stop_timer(&mut self) {
        self.timer = TurnTimer {
            epoch: self.timer.epoch + 1,
            running: false,
            time_left: Duration::ZERO,
        };
    }

    /// Records the time left on the countdown identified by `epoch`
    ///
    /// Returns `false` if that countdown has been superseded.
    pub fn countdown(&mut self, epoch: u64, remaining: Duration) -> bool {
        if epoch != self.timer.epoch || !self.timer.running {
            return false;
        }
        self.timer.time_left = remaining;
        true
    }

    /// Applies the expiry of the countdown identified by `epoch`
    ///
    /// A pending clue is approved by default; in the clue and guess phases
    /// the turn passes to the other team. Returns `None` for a superseded
    /// countdown or outside the timed phases.
    pub fn turn_timeout(&mut self, epoch: u64) -> Option<Timeout> {
        if epoch != self.timer.epoch || !self.timer.running {
            return None;
        }

        match self.state {
            GameState::WaitingApproval => {
                self.state = GameState::WaitingGuess;
                self.restart_timer();
                Some(Timeout::ClueAccepted)
            }
            GameState::WaitingClue | GameState::WaitingGuess => {
                self.pass_turn();
                self.current_turn.map(Timeout::TurnPassed)
            }
            _ => {
                self.stop_timer();
                None
            }
        }
    }
}

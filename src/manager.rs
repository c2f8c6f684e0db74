//! Message routing between connections and the table
//!
//! The [`TableManager`] owns the [`Table`] and the connection side table. It
//! decodes client frames, applies them to the table, replies to the sender,
//! and broadcasts a status snapshot to every connection after each change.
//!
//! Snapshots are personalized: while a clue awaits approval only the
//! approving hub sees it; once approved, everybody does.
//!
//! Timing is delegated to the caller through a `schedule_message` callback,
//! so the manager itself stays synchronous.

use log::{debug, info, warn};
use serde::Deserialize;
use serde_with::{DisplayFromStr, PickFirst, serde_as};

use crate::{
    AlarmMessage, OutgoingMessage,
    board::{Board, Team},
    config::Options,
    connections::{Connections, Id},
    constants,
    player::Role,
    session::Tunnel,
    table::{
        ConfigError, GameState, GuessOutcome, Rejection, Replay, StartOutcome,
        Status, Table,
    },
    words::WordPool,
};

/// Every frame a client may send
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum IncomingMessage {
    /// Greeting sent right after connecting
    Connection,
    /// Ask to be seated under a name
    NameRequest {
        /// Requested player name
        name: String,
    },
    /// Ask to join a team
    TeamRequest {
        /// Requested team
        team: Team,
    },
    /// Ask for a role on the current team
    RoleRequest {
        /// Requested role
        role: Role,
    },
    /// A hub declares their team ready
    StartRequest,
    /// The active hub gives a clue
    NewClue {
        /// Clue word
        clue: String,
        /// Number of tiles the clue points at, as a number or numeric string
        #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
        count: usize,
    },
    /// The opposing hub approves the pending clue
    ClueApproved,
    /// The opposing hub rejects the pending clue
    ClueRejected,
    /// An orbital exposes a tile
    NewGuess {
        /// Word on the tile
        guess: String,
    },
    /// An orbital gives up the remaining guesses
    EndTurn,
    /// Vote to play another round
    ReplayRequest,
    /// Ask for a fresh snapshot
    StatusRequest,
}

/// What goes back to the sender of a request
enum Reply {
    /// Text reply with the sender's snapshot
    Msg(String),
    /// Bare snapshot reply
    Status,
    /// Text reply without a snapshot
    Notice(&'static str),
}

/// Result of applying one request
struct Response {
    reply: Reply,
    broadcast: Option<String>,
}

impl Response {
    fn new(reply: impl Into<String>, broadcast: impl Into<String>) -> Self {
        Self {
            reply: Reply::Msg(reply.into()),
            broadcast: Some(broadcast.into()),
        }
    }

    fn status(broadcast: Option<String>) -> Self {
        Self {
            reply: Reply::Status,
            broadcast,
        }
    }

    fn greeting() -> Self {
        Self {
            reply: Reply::Notice("provide name"),
            broadcast: None,
        }
    }
}

/// Routes client messages into a single table
#[derive(Debug)]
pub struct TableManager {
    table: Table,
    connections: Connections,
}

impl TableManager {
    /// Creates a manager around a new table
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the options are invalid.
    pub fn new(options: Options, board: Board) -> Result<Self, ConfigError> {
        Ok(Self {
            table: Table::new(options, board)?,
            connections: Connections::default(),
        })
    }

    /// Creates a manager around a table dealing random boards from `pool`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the options are invalid or the pool is too
    /// small for the configured tile count.
    pub fn with_word_pool(options: Options, pool: WordPool) -> Result<Self, ConfigError> {
        Ok(Self {
            table: Table::with_word_pool(options, pool)?,
            connections: Connections::default(),
        })
    }

    /// The managed table
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// The open connections
    pub fn connections(&self) -> &Connections {
        &self.connections
    }

    /// Registers a new connection and greets it
    pub fn add_connection<T: Tunnel, F: Fn(Id) -> Option<T>>(&mut self, id: Id, tunnel_finder: F) {
        self.connections.add_connection(id);
        debug!("connection {id} opened");
        self.connections.send_message(
            &OutgoingMessage::notice("provide name"),
            id,
            tunnel_finder,
        );
    }

    /// The snapshot a given player is entitled to see
    pub fn status_for(&self, name: Option<&str>) -> Status {
        let status = self.table.status();
        if self.sees_clue(name) {
            status.reveal_clue(self.table.current_clue(), self.table.guess_budget())
        } else {
            status
        }
    }

    fn sees_clue(&self, name: Option<&str>) -> bool {
        match self.table.state() {
            GameState::WaitingGuess => true,
            GameState::WaitingApproval => name.is_some() && name == self.table.approver(),
            _ => false,
        }
    }

    /// Handles a raw frame from a connection
    ///
    /// Unparseable frames are answered with `message not recognized`. Until a
    /// connection has a name, only greetings and name requests are handled.
    pub fn receive_message<
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(AlarmMessage, web_time::Duration),
    >(
        &mut self,
        id: Id,
        frame: &str,
        mut schedule_message: S,
        tunnel_finder: F,
    ) {
        if !self.connections.has_connection(id) {
            debug!("ignoring frame from unknown connection {id}");
            return;
        }

        let message = match serde_json::from_str::<IncomingMessage>(frame) {
            Ok(message) => message,
            Err(e) => {
                warn!("unrecognized frame from {id}: {e}");
                self.connections.send_message(
                    &OutgoingMessage::notice("message not recognized"),
                    id,
                    &tunnel_finder,
                );
                return;
            }
        };

        let epoch = self.table.timer().epoch();

        let response = match (self.connections.name(id).map(str::to_owned), message) {
            (None, IncomingMessage::Connection) => Ok(Response::greeting()),
            (None, IncomingMessage::NameRequest { name }) => match self.table.player_joins(&name) {
                Ok(name) => {
                    self.connections.set_name(id, name.as_str());
                    Ok(Response::new(
                        "name accepted",
                        format!("{name} has joined the game"),
                    ))
                }
                Err(rejection) => Err(rejection),
            },
            (None, message) => {
                debug!("ignoring {message:?} from unnamed connection {id}");
                return;
            }
            (Some(name), message) => self.apply(&name, message),
        };

        let name = self.connections.name(id);
        let reply = match &response {
            Ok(Response {
                reply: Reply::Status,
                ..
            }) => OutgoingMessage::Status {
                status: self.status_for(name),
            },
            Ok(Response {
                reply: Reply::Notice(msg),
                ..
            }) => OutgoingMessage::notice(*msg),
            Ok(Response {
                reply: Reply::Msg(msg),
                ..
            }) => OutgoingMessage::Msg {
                msg: msg.clone(),
                status: Some(self.status_for(name)),
            },
            Err(rejection) => {
                debug!("rejected request from {id}: {rejection}");
                OutgoingMessage::Msg {
                    msg: rejection.to_string(),
                    status: Some(self.status_for(name)),
                }
            }
        };
        self.connections.send_message(&reply, id, &tunnel_finder);

        if let Ok(Response {
            broadcast: Some(event),
            ..
        }) = &response
        {
            self.broadcast(event, &tunnel_finder);
        }

        self.sync_timer(epoch, &mut schedule_message);
    }

    /// Applies a request from a seated player
    fn apply(&mut self, name: &str, message: IncomingMessage) -> Result<Response, Rejection> {
        let table = &mut self.table;
        Ok(match message {
            IncomingMessage::TeamRequest { team } => {
                table.team_request(name, team)?;
                Response::new("team accepted", format!("{name} has joined the {team} team"))
            }
            IncomingMessage::RoleRequest { role } => {
                table.role_request(name, role)?;
                Response::new("role accepted", format!("{name} is now a {role}"))
            }
            IncomingMessage::StartRequest => match table.start_request(name)? {
                StartOutcome::Waiting => {
                    Response::status(Some(format!("{name} is ready to start")))
                }
                StartOutcome::Started => Response::status(Some(StartOutcome::Started.to_string())),
            },
            IncomingMessage::NewClue { clue, count } => {
                table.new_clue(name, &clue, count)?;
                Response::new("clue submitted", "new clue has been submitted")
            }
            IncomingMessage::ClueApproved => {
                Response::new(table.clue_response(name, true)?.to_string(), "clue has been approved")
            }
            IncomingMessage::ClueRejected => Response::new(
                table.clue_response(name, false)?.to_string(),
                "clue has been rejected",
            ),
            IncomingMessage::NewGuess { guess } => {
                let outcome = table.new_guess(name, &guess)?;
                let event = match outcome {
                    GuessOutcome::Continue => "guess has been submitted".to_owned(),
                    GuessOutcome::TurnOver => "guess has been submitted, turn is over".to_owned(),
                    GuessOutcome::GameOver(winner) => format!("game over, {winner} team wins"),
                };
                Response::new(outcome.to_string(), event)
            }
            IncomingMessage::EndTurn => {
                table.end_turn(name)?;
                Response::new("turn ended", format!("{name} ended the turn"))
            }
            IncomingMessage::ReplayRequest => match table.replay_request(name)? {
                Replay::Waiting => Response::new(
                    "request accepted",
                    format!("{name} is ready to play again"),
                ),
                Replay::Restarted => {
                    Response::new("request accepted", Replay::Restarted.to_string())
                }
            },
            IncomingMessage::StatusRequest => Response::status(None),
            IncomingMessage::Connection => Response::greeting(),
            IncomingMessage::NameRequest { .. } => return Err(Rejection::NameAssigned),
        })
    }

    /// Handles a connection going away
    ///
    /// The player bound to it, if any, leaves the table and everyone else is
    /// told.
    pub fn remove_connection<
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(AlarmMessage, web_time::Duration),
    >(
        &mut self,
        id: Id,
        mut schedule_message: S,
        tunnel_finder: F,
    ) {
        let Some(value) = self.connections.remove_connection(id) else {
            return;
        };
        debug!("connection {id} closed");

        let Some(name) = value.name() else {
            return;
        };

        let epoch = self.table.timer().epoch();
        match self.table.player_leaves(name) {
            Ok(departure) => {
                debug!("{name} departed: {departure:?}");
                self.broadcast(&format!("{name} has left"), &tunnel_finder);
            }
            Err(rejection) => warn!("connection {id} named {name} had no seat: {rejection}"),
        }
        self.sync_timer(epoch, &mut schedule_message);
    }

    /// Handles a scheduled countdown step
    pub fn receive_alarm<
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(AlarmMessage, web_time::Duration),
    >(
        &mut self,
        message: AlarmMessage,
        mut schedule_message: S,
        tunnel_finder: F,
    ) {
        match message {
            AlarmMessage::Countdown { epoch, remaining } if remaining.is_zero() => {
                match self.table.turn_timeout(epoch) {
                    Some(timeout) => {
                        info!("{timeout}");
                        self.broadcast(&timeout.to_string(), &tunnel_finder);
                        self.sync_timer(epoch, &mut schedule_message);
                    }
                    None => debug!("ignoring stale timeout for epoch {epoch}"),
                }
            }
            AlarmMessage::Countdown { epoch, remaining } => {
                if self.table.countdown(epoch, remaining) {
                    if let Some(time_left) = self.table.timer().seconds_left() {
                        self.connections
                            .announce(&OutgoingMessage::Tick { time_left }, &tunnel_finder);
                    }
                    schedule_countdown(epoch, remaining, &mut schedule_message);
                } else {
                    debug!("ignoring stale countdown for epoch {epoch}");
                }
            }
        }
    }

    /// Sends an event with each recipient's snapshot to every connection
    fn broadcast<T: Tunnel, F: Fn(Id) -> Option<T>>(&self, event: &str, tunnel_finder: F) {
        let status = self.table.status();
        let revealed = status
            .clone()
            .reveal_clue(self.table.current_clue(), self.table.guess_budget());

        self.connections.announce_with(
            |_, name| {
                Some(OutgoingMessage::Broadcast {
                    msg: event.to_owned(),
                    status: if self.sees_clue(name) {
                        revealed.clone()
                    } else {
                        status.clone()
                    },
                })
            },
            tunnel_finder,
        );
    }

    /// Schedules the first step of a countdown the last mutation started
    fn sync_timer<S: FnMut(AlarmMessage, web_time::Duration)>(
        &self,
        previous_epoch: u64,
        schedule_message: &mut S,
    ) {
        let timer = self.table.timer();
        if timer.epoch() != previous_epoch && timer.is_running() {
            debug!(
                "countdown {} started with {:?} left",
                timer.epoch(),
                timer.time_left()
            );
            schedule_countdown(timer.epoch(), timer.time_left(), schedule_message);
        }
    }

    /// Closes every connection and resets the table to its initial state
    pub fn reset<T: Tunnel, F: Fn(Id) -> Option<T>>(&mut self, tunnel_finder: F) {
        self.connections.close_all(tunnel_finder);
        self.table.clear();
        info!("table reset");
    }
}

/// Schedules the next countdown step, at most one tick away
fn schedule_countdown<S: FnMut(AlarmMessage, web_time::Duration)>(
    epoch: u64,
    remaining: web_time::Duration,
    schedule_message: &mut S,
) {
    let step = remaining.min(web_time::Duration::from_millis(constants::timer::TICK_MILLIS));
    schedule_message(
        AlarmMessage::Countdown {
            epoch,
            remaining: remaining - step,
        },
        step,
    );
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::{
        cell::RefCell,
        collections::{HashMap, VecDeque},
        rc::Rc,
    };

    use super::*;

    #[derive(Clone, Default)]
    struct MockTunnel {
        messages: Rc<RefCell<VecDeque<OutgoingMessage>>>,
        closed: Rc<RefCell<bool>>,
    }

    impl MockTunnel {
        fn take(&self) -> Vec<OutgoingMessage> {
            self.messages.borrow_mut().drain(..).collect()
        }
    }

    impl Tunnel for MockTunnel {
        fn send_message(&self, message: &OutgoingMessage) {
            self.messages.borrow_mut().push_back(message.clone());
        }

        fn close(self) {
            *self.closed.borrow_mut() = true;
        }
    }

    const BLUE: [&str; 8] = [
        "APPLE", "BOMB", "CROWN", "DAD", "EASTER", "FLAG", "GIANT", "HOME",
    ];
    const ORANGE: [&str; 7] = [
        "INDIA", "JUICE", "KILOGRAM", "LION", "MEXICO", "NIGHT", "OPERA",
    ];

    fn test_board() -> Board {
        Board::preset(
            BLUE.iter()
                .map(|w| (*w, Some(Team::Blue)))
                .chain(ORANGE.iter().map(|w| (*w, Some(Team::Orange))))
                .chain([("PASTA", None)]),
            Team::Blue,
        )
    }

    type Alarms = Vec<(AlarmMessage, web_time::Duration)>;

    struct Harness {
        manager: TableManager,
        tunnels: HashMap<String, (Id, MockTunnel)>,
        alarms: Alarms,
    }

    impl Harness {
        fn new(options: Options) -> Self {
            Self {
                manager: TableManager::new(options, test_board()).unwrap(),
                tunnels: HashMap::new(),
                alarms: Vec::new(),
            }
        }

        fn connect(&mut self, label: &str) -> Id {
            let id = Id::new();
            self.tunnels
                .insert(label.to_owned(), (id, MockTunnel::default()));
            let tunnels = self.tunnels.clone();
            self.manager.add_connection(id, |i| {
                tunnels
                    .values()
                    .find(|(tid, _)| *tid == i)
                    .map(|(_, t)| t.clone())
            });
            id
        }

        fn send(&mut self, label: &str, frame: &str) {
            let id = self.tunnels[label].0;
            let tunnels = self.tunnels.clone();
            let alarms = &mut self.alarms;
            self.manager.receive_message(
                id,
                frame,
                |alarm, delay| alarms.push((alarm, delay)),
                |i| {
                    tunnels
                        .values()
                        .find(|(tid, _)| *tid == i)
                        .map(|(_, t)| t.clone())
                },
            );
        }

        fn alarm(&mut self, alarm: AlarmMessage) {
            let tunnels = self.tunnels.clone();
            let alarms = &mut self.alarms;
            self.manager.receive_alarm(
                alarm,
                |alarm, delay| alarms.push((alarm, delay)),
                |i| {
                    tunnels
                        .values()
                        .find(|(tid, _)| *tid == i)
                        .map(|(_, t)| t.clone())
                },
            );
        }

        fn disconnect(&mut self, label: &str) {
            let Some((id, _)) = self.tunnels.remove(label) else {
                return;
            };
            let tunnels = self.tunnels.clone();
            let alarms = &mut self.alarms;
            self.manager.remove_connection(
                id,
                |alarm, delay| alarms.push((alarm, delay)),
                |i| {
                    tunnels
                        .values()
                        .find(|(tid, _)| *tid == i)
                        .map(|(_, t)| t.clone())
                },
            );
        }

        fn inbox(&self, label: &str) -> Vec<OutgoingMessage> {
            self.tunnels[label].1.take()
        }

        fn clear_inboxes(&self) {
            for (_, tunnel) in self.tunnels.values() {
                tunnel.take();
            }
        }

        fn join(&mut self, name: &str) {
            self.connect(name);
            self.inbox(name);
            self.send(
                name,
                &format!(r#"{{"type":"name-request","name":"{name}"}}"#),
            );
        }

        fn seat_everyone(&mut self) {
            for name in ["Ann", "Bob", "Cary", "Dina", "Elsa", "Finn", "Gina", "Hank"] {
                self.join(name);
            }
            for name in ["Ann", "Bob", "Cary", "Dina"] {
                self.send(name, r#"{"type":"team-request","team":"blue"}"#);
            }
            for name in ["Elsa", "Finn", "Gina", "Hank"] {
                self.send(name, r#"{"type":"team-request","team":"orange"}"#);
            }
            self.send("Ann", r#"{"type":"role-request","role":"hub"}"#);
            self.send("Elsa", r#"{"type":"role-request","role":"hub"}"#);
        }

        fn start(&mut self) {
            self.seat_everyone();
            self.send("Ann", r#"{"type":"start-request"}"#);
            self.send("Elsa", r#"{"type":"start-request"}"#);
            self.clear_inboxes();
        }
    }

    fn reply_text(messages: &[OutgoingMessage]) -> Option<&str> {
        messages.iter().find_map(|m| match m {
            OutgoingMessage::Msg { msg, .. } => Some(msg.as_str()),
            _ => None,
        })
    }

    fn broadcasts(messages: &[OutgoingMessage]) -> Vec<(&str, &Status)> {
        messages
            .iter()
            .filter_map(|m| match m {
                OutgoingMessage::Broadcast { msg, status } => Some((msg.as_str(), status)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_connection_greeting() {
        let mut harness = Harness::new(Options::default().without_timer());
        harness.connect("guest");
        assert_eq!(
            harness.inbox("guest"),
            vec![OutgoingMessage::notice("provide name")]
        );
        harness.send("guest", r#"{"type":"connection"}"#);
        assert_eq!(
            harness.inbox("guest"),
            vec![OutgoingMessage::notice("provide name")]
        );

        harness.join("Ann");
        harness.clear_inboxes();
        harness.send("Ann", r#"{"type":"connection"}"#);
        assert_eq!(
            harness.inbox("Ann"),
            vec![OutgoingMessage::notice("provide name")]
        );
        assert!(harness.inbox("guest").is_empty());
    }

    #[test]
    fn test_name_request_replies_and_broadcasts() {
        let mut harness = Harness::new(Options::default().without_timer());
        harness.connect("watcher");
        harness.join("Ann");

        let inbox = harness.inbox("Ann");
        assert_eq!(reply_text(&inbox), Some("name accepted"));
        let watcher = harness.inbox("watcher");
        let events = broadcasts(&watcher);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "Ann has joined the game");
        assert_eq!(events[0].1.player_count, 1);
    }

    #[test]
    fn test_duplicate_name_and_second_name() {
        let mut harness = Harness::new(Options::default().without_timer());
        harness.join("Ann");
        harness.connect("other");
        harness.inbox("other");
        harness.send("other", r#"{"type":"name-request","name":"Ann"}"#);
        assert_eq!(reply_text(&harness.inbox("other")), Some("player name exists"));

        harness.clear_inboxes();
        harness.send("Ann", r#"{"type":"name-request","name":"Zed"}"#);
        assert_eq!(
            reply_text(&harness.inbox("Ann")),
            Some("player has an existing name")
        );
        assert_eq!(harness.manager.connections().name(harness.tunnels["Ann"].0), Some("Ann"));
    }

    #[test]
    fn test_unnamed_connections_are_ignored() {
        let mut harness = Harness::new(Options::default().without_timer());
        harness.connect("guest");
        harness.inbox("guest");
        harness.send("guest", r#"{"type":"team-request","team":"blue"}"#);
        harness.send("guest", r#"{"type":"status-request"}"#);
        assert!(harness.inbox("guest").is_empty());
    }

    #[test]
    fn test_unrecognized_frames() {
        let mut harness = Harness::new(Options::default().without_timer());
        harness.join("Ann");
        harness.clear_inboxes();
        for frame in [
            "not json",
            r#"{"type":"dance"}"#,
            r#"{"type":"team-request"}"#,
            r#"{"type":"team-request","team":"green"}"#,
            r#"{"name":"Ann"}"#,
        ] {
            harness.send("Ann", frame);
            assert_eq!(
                harness.inbox("Ann"),
                vec![OutgoingMessage::notice("message not recognized")]
            );
        }
    }

    #[test]
    fn test_team_and_role_messages() {
        let mut harness = Harness::new(Options::default().without_timer());
        harness.join("Ann");
        harness.clear_inboxes();
        harness.send("Ann", r#"{"type":"role-request","role":"hub"}"#);
        assert_eq!(
            reply_text(&harness.inbox("Ann")),
            Some("player must belong to team to request role")
        );

        harness.send("Ann", r#"{"type":"team-request","team":"blue"}"#);
        let inbox = harness.inbox("Ann");
        assert_eq!(reply_text(&inbox), Some("team accepted"));
        assert_eq!(broadcasts(&inbox)[0].0, "Ann has joined the blue team");

        harness.send("Ann", r#"{"type":"role-request","role":"hub"}"#);
        let inbox = harness.inbox("Ann");
        assert_eq!(reply_text(&inbox), Some("role accepted"));
        assert_eq!(broadcasts(&inbox)[0].0, "Ann is now a hub");
    }

    #[test]
    fn test_start_request_replies_with_status() {
        let mut harness = Harness::new(Options::default().without_timer());
        harness.seat_everyone();
        harness.clear_inboxes();

        harness.send("Ann", r#"{"type":"start-request"}"#);
        let inbox = harness.inbox("Ann");
        assert!(matches!(inbox[0], OutgoingMessage::Status { .. }));
        assert_eq!(broadcasts(&inbox)[0].0, "Ann is ready to start");

        harness.send("Elsa", r#"{"type":"start-request"}"#);
        let inbox = harness.inbox("Bob");
        let events = broadcasts(&inbox);
        assert_eq!(events.last().unwrap().0, "game has started");
        assert_eq!(events.last().unwrap().1.game_state, GameState::WaitingClue);
    }

    #[test]
    fn test_start_rejection_is_explained() {
        let mut harness = Harness::new(Options::default().without_timer());
        harness.seat_everyone();
        harness.clear_inboxes();
        harness.send("Bob", r#"{"type":"start-request"}"#);
        assert_eq!(
            reply_text(&harness.inbox("Bob")),
            Some("only hub roles can request start")
        );
    }

    #[test]
    fn test_clue_visible_only_to_approver_until_approved() {
        let mut harness = Harness::new(Options::default().without_timer());
        harness.start();
        harness.send("Ann", r#"{"type":"new-clue","clue":"FRUIT","count":"2"}"#);

        let ann = harness.inbox("Ann");
        assert_eq!(reply_text(&ann), Some("clue submitted"));
        assert_eq!(broadcasts(&ann)[0].1.clue, None);

        let elsa = harness.inbox("Elsa");
        let (event, status) = broadcasts(&elsa)[0];
        assert_eq!(event, "new clue has been submitted");
        assert_eq!(status.clue.as_deref(), Some("FRUIT"));
        assert_eq!(status.guesses_left, Some(2));

        for name in ["Bob", "Finn", "Hank"] {
            let inbox = harness.inbox(name);
            let (event, status) = broadcasts(&inbox)[0];
            assert_eq!(event, "new clue has been submitted");
            assert_eq!(status.clue, None);
            assert_eq!(status.guesses_left, None);
        }

        harness.send("Ann", r#"{"type":"status-request"}"#);
        harness.send("Finn", r#"{"type":"status-request"}"#);
        for name in ["Ann", "Finn"] {
            let inbox = harness.inbox(name);
            let OutgoingMessage::Status { status } = &inbox[0] else {
                panic!("expected a status reply, got {:?}", inbox[0]);
            };
            assert_eq!(status.clue, None);
        }

        harness.send("Elsa", r#"{"type":"clue-approved"}"#);
        assert_eq!(reply_text(&harness.inbox("Elsa")), Some("clue was accepted"));
        for name in ["Ann", "Bob", "Finn", "Hank"] {
            let inbox = harness.inbox(name);
            let (event, status) = broadcasts(&inbox)[0];
            assert_eq!(event, "clue has been approved");
            assert_eq!(status.clue.as_deref(), Some("FRUIT"));
            assert_eq!(status.guesses_left, Some(2));
        }
    }

    #[test]
    fn test_guess_flow() {
        let mut harness = Harness::new(Options::default().without_timer());
        harness.start();
        harness.send("Ann", r#"{"type":"new-clue","clue":"FRUIT","count":1}"#);
        harness.send("Elsa", r#"{"type":"clue-approved"}"#);
        harness.clear_inboxes();

        harness.send("Ann", r#"{"type":"new-guess","guess":"APPLE"}"#);
        assert_eq!(
            reply_text(&harness.inbox("Ann")),
            Some("hubs cannot submit guesses")
        );

        harness.send("Bob", r#"{"type":"new-guess","guess":"APPLE"}"#);
        assert_eq!(reply_text(&harness.inbox("Bob")), Some("turn is over"));
        let inbox = harness.inbox("Finn");
        let (event, status) = broadcasts(&inbox)[0];
        assert_eq!(event, "guess has been submitted, turn is over");
        assert_eq!(status.current_turn, Some(Team::Orange));
        assert_eq!(status.clue, None);
        assert!(status.tiles.contains(&("APPLE".to_owned(), "blue".to_owned())));
    }

    #[test]
    fn test_end_turn_message() {
        let mut harness = Harness::new(Options::default().without_timer());
        harness.start();
        harness.send("Ann", r#"{"type":"new-clue","clue":"FRUIT","count":3}"#);
        harness.send("Elsa", r#"{"type":"clue-approved"}"#);
        harness.clear_inboxes();
        harness.send("Cary", r#"{"type":"end-turn"}"#);
        assert_eq!(reply_text(&harness.inbox("Cary")), Some("turn ended"));
        assert_eq!(
            harness.manager.table().current_turn(),
            Some(Team::Orange)
        );
    }

    #[test]
    fn test_disconnect_resets_game() {
        let mut harness = Harness::new(Options::default().without_timer());
        harness.start();
        harness.disconnect("Elsa");

        let inbox = harness.inbox("Bob");
        let (event, status) = broadcasts(&inbox)[0];
        assert_eq!(event, "Elsa has left");
        assert_eq!(status.game_state, GameState::WaitingPlayers);
        assert_eq!(status.player_count, 7);
        assert!(harness.manager.table().player("Elsa").is_none());
    }

    #[test]
    fn test_unnamed_disconnect_is_silent() {
        let mut harness = Harness::new(Options::default().without_timer());
        harness.join("Ann");
        harness.connect("guest");
        harness.clear_inboxes();
        harness.disconnect("guest");
        assert!(harness.inbox("Ann").is_empty());
        assert_eq!(harness.manager.connections().len(), 1);
    }

    #[test]
    fn test_timer_scheduled_on_start() {
        let mut harness = Harness::new(Options::default());
        harness.start();
        let epoch = harness.manager.table().timer().epoch();
        assert_eq!(
            harness.alarms.last(),
            Some(&(
                AlarmMessage::Countdown {
                    epoch,
                    remaining: web_time::Duration::from_secs(59),
                },
                web_time::Duration::from_secs(1),
            ))
        );
    }

    #[test]
    fn test_countdown_ticks_and_reschedules() {
        let mut harness = Harness::new(Options::default());
        harness.start();
        let epoch = harness.manager.table().timer().epoch();
        harness.alarms.clear();

        harness.alarm(AlarmMessage::Countdown {
            epoch,
            remaining: web_time::Duration::from_secs(59),
        });
        assert_eq!(
            harness.inbox("Bob"),
            vec![OutgoingMessage::Tick { time_left: 59 }]
        );
        assert_eq!(harness.alarms.len(), 1);
        assert_eq!(
            harness.alarms[0].0,
            AlarmMessage::Countdown {
                epoch,
                remaining: web_time::Duration::from_secs(58),
            }
        );
    }

    #[test]
    fn test_timeout_passes_turn() {
        let mut harness = Harness::new(Options::default());
        harness.start();
        let epoch = harness.manager.table().timer().epoch();
        harness.alarms.clear();

        harness.alarm(AlarmMessage::Countdown {
            epoch,
            remaining: web_time::Duration::ZERO,
        });
        let inbox = harness.inbox("Bob");
        let (event, status) = broadcasts(&inbox)[0];
        assert!(event.starts_with("time is up"));
        assert_eq!(status.current_turn, Some(Team::Orange));
        assert_eq!(status.time_left, Some(60));
        assert_eq!(harness.alarms.len(), 1);
    }

    #[test]
    fn test_stale_alarm_is_dropped() {
        let mut harness = Harness::new(Options::default());
        harness.start();
        let stale = harness.manager.table().timer().epoch();
        harness.send("Ann", r#"{"type":"new-clue","clue":"FRUIT","count":1}"#);
        harness.clear_inboxes();
        harness.alarms.clear();

        harness.alarm(AlarmMessage::Countdown {
            epoch: stale,
            remaining: web_time::Duration::ZERO,
        });
        harness.alarm(AlarmMessage::Countdown {
            epoch: stale,
            remaining: web_time::Duration::from_secs(10),
        });
        assert!(harness.inbox("Bob").is_empty());
        assert!(harness.alarms.is_empty());
        assert_eq!(
            harness.manager.table().state(),
            GameState::WaitingApproval
        );
    }

    #[test]
    fn test_correct_guess_keeps_countdown() {
        let mut harness = Harness::new(Options::default());
        harness.start();
        harness.send("Ann", r#"{"type":"new-clue","clue":"FRUIT","count":2}"#);
        harness.send("Elsa", r#"{"type":"clue-approved"}"#);
        harness.alarms.clear();
        harness.send("Bob", r#"{"type":"new-guess","guess":"APPLE"}"#);
        assert!(harness.alarms.is_empty());
    }

    #[test]
    fn test_reset_closes_connections() {
        let mut harness = Harness::new(Options::default().without_timer());
        harness.join("Ann");
        let tunnel = harness.tunnels["Ann"].1.clone();
        let tunnels = harness.tunnels.clone();
        harness.manager.reset(|i| {
            tunnels
                .values()
                .find(|(tid, _)| *tid == i)
                .map(|(_, t)| t.clone())
        });
        assert!(*tunnel.closed.borrow());
        assert!(harness.manager.connections().is_empty());
        assert_eq!(harness.manager.table().status().player_count, 0);
    }

    #[test]
    fn test_status_request() {
        let mut harness = Harness::new(Options::default().without_timer());
        harness.join("Ann");
        harness.clear_inboxes();
        harness.send("Ann", r#"{"type":"status-request"}"#);
        let inbox = harness.inbox("Ann");
        assert_eq!(inbox.len(), 1);
        let OutgoingMessage::Status { status } = &inbox[0] else {
            panic!("expected a status reply");
        };
        assert_eq!(status.player_count, 1);
        assert!(status.players.contains_key("Ann"));
    }
}

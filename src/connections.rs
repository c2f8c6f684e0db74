//! Connection management
//!
//! This module tracks every open connection and the player name bound to it,
//! if any. It is the only place that maps transport identities to players;
//! the [`Table`](crate::table::Table) only ever sees names.

use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
    str::FromStr,
};

use enum_map::{Enum, EnumMap};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use uuid::Uuid;

use crate::{OutgoingMessage, session::Tunnel};

/// An opaque identifier for one client connection
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Id {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// What is known about a connection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// Connected but not yet seated
    Unnamed,
    /// Seated under the given player name
    Named(String),
}

/// The kind of connection without associated data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum)]
pub enum ValueKind {
    /// A connection without a player
    Unnamed,
    /// A connection bound to a player
    Named,
}

impl Value {
    /// Returns the kind of this value without the associated data
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Unnamed => ValueKind::Unnamed,
            Value::Named(_) => ValueKind::Named,
        }
    }

    /// The player name, if the connection has one
    pub fn name(&self) -> Option<&str> {
        match self {
            Value::Unnamed => None,
            Value::Named(name) => Some(name),
        }
    }
}

/// All open connections and the names bound to them
#[derive(Debug, Default)]
pub struct Connections {
    mapping: HashMap<Id, Value>,
    reverse_mapping: EnumMap<ValueKind, HashSet<Id>>,
}

impl Connections {
    /// Registers a new, unnamed connection
    ///
    /// Registering an ID twice keeps its current value.
    pub fn add_connection(&mut self, id: Id) {
        if self.mapping.contains_key(&id) {
            return;
        }
        self.mapping.insert(id, Value::Unnamed);
        self.reverse_mapping[ValueKind::Unnamed].insert(id);
    }

    /// Binds a player name to a registered connection
    pub fn set_name(&mut self, id: Id, name: impl Into<String>) {
        self.update_value(id, Value::Named(name.into()));
    }

    fn update_value(&mut self, id: Id, value: Value) {
        let old_kind = match self.mapping.get(&id) {
            Some(v) => v.kind(),
            _ => return,
        };
        let new_kind = value.kind();
        if old_kind != new_kind {
            self.reverse_mapping[old_kind].remove(&id);
            self.reverse_mapping[new_kind].insert(id);
        }
        self.mapping.insert(id, value);
    }

    /// Forgets a connection, returning what was known about it
    pub fn remove_connection(&mut self, id: Id) -> Option<Value> {
        let value = self.mapping.remove(&id)?;
        self.reverse_mapping[value.kind()].remove(&id);
        Some(value)
    }

    /// Whether the connection is registered
    pub fn has_connection(&self, id: Id) -> bool {
        self.mapping.contains_key(&id)
    }

    /// The player name bound to a connection
    pub fn name(&self, id: Id) -> Option<&str> {
        self.mapping.get(&id).and_then(Value::name)
    }

    /// Finds the connection a player is seated through
    pub fn id_of(&self, name: &str) -> Option<Id> {
        self.reverse_mapping[ValueKind::Named]
            .iter()
            .copied()
            .find(|id| self.name(*id) == Some(name))
    }

    /// Number of open connections
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    /// Whether no connection is open
    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Number of connections of one kind
    pub fn specific_count(&self, filter: ValueKind) -> usize {
        self.reverse_mapping[filter].len()
    }

    /// Sends a message to a single connection
    pub fn send_message<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        message: &OutgoingMessage,
        id: Id,
        tunnel_finder: F,
    ) {
        let Some(session) = tunnel_finder(id) else {
            return;
        };

        session.send_message(message);
    }

    /// Sends personalized messages to every connection
    ///
    /// The sender is called with each connection and its player name, and may
    /// return `None` to skip that connection.
    pub fn announce_with<S, T: Tunnel, F: Fn(Id) -> Option<T>>(&self, sender: S, tunnel_finder: F)
    where
        S: Fn(Id, Option<&str>) -> Option<OutgoingMessage>,
    {
        for (id, value) in &self.mapping {
            let Some(session) = tunnel_finder(*id) else {
                continue;
            };
            let Some(message) = sender(*id, value.name()) else {
                continue;
            };

            session.send_message(&message);
        }
    }

    /// Sends the same message to every connection
    pub fn announce<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        message: &OutgoingMessage,
        tunnel_finder: F,
    ) {
        self.announce_with(|_, _| Some(message.to_owned()), tunnel_finder);
    }

    /// Closes every tunnel and forgets all connections
    pub fn close_all<T: Tunnel, F: Fn(Id) -> Option<T>>(&mut self, tunnel_finder: F) {
        for (id, _) in self.mapping.drain() {
            if let Some(session) = tunnel_finder(id) {
                session.close();
            }
        }
        self.reverse_mapping = EnumMap::default();
    }
}

//! Async gateway around a single table
//!
//! [`TableServer`] is what a transport layer talks to: it registers tunnels,
//! feeds client frames and disconnects into the [`TableManager`], and runs
//! the turn countdown on the tokio runtime.
//!
//! All state lives behind one mutex. Client frames and countdown steps take
//! the same lock, so they are applied one at a time and every broadcast is
//! built from the state the change produced. At most one countdown task is
//! live; replacing it aborts the old task and waits for it to finish before
//! the new one is spawned.

use std::{collections::HashMap, sync::Arc};

use derive_where::derive_where;
use log::{debug, info, warn};
use tokio::{sync::Mutex, task::JoinHandle};

use crate::{
    AlarmMessage,
    config::Options,
    connections::Id,
    manager::TableManager,
    session::Tunnel,
    table::{ConfigError, Status},
    words::WordPool,
};

type Scheduled = Option<(AlarmMessage, web_time::Duration)>;

/// Open tunnels by connection
#[derive_where(Default)]
struct Tunnels<T> {
    map: HashMap<Id, T>,
}

impl<T: Clone> Tunnels<T> {
    fn find(&self, id: Id) -> Option<T> {
        self.map.get(&id).cloned()
    }
}

struct ServerState<T> {
    manager: TableManager,
    tunnels: Tunnels<T>,
    countdown: Option<JoinHandle<()>>,
    generation: u64,
}

/// A shareable handle to one running table
#[derive_where(Clone)]
pub struct TableServer<T> {
    inner: Arc<Mutex<ServerState<T>>>,
}

impl<T: Tunnel + Clone + Send + 'static> TableServer<T> {
    /// Wraps a manager
    pub fn new(manager: TableManager) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ServerState {
                manager,
                tunnels: Tunnels::default(),
                countdown: None,
                generation: 0,
            })),
        }
    }

    /// Creates a server for a table dealing random boards from `pool`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the options are invalid or the pool is too
    /// small, so a misconfigured server never starts.
    pub fn with_word_pool(options: Options, pool: WordPool) -> Result<Self, ConfigError> {
        let manager = TableManager::with_word_pool(options, pool)?;
        info!(
            "table ready for {} players with {} tiles",
            options.player_limit, options.tile_count
        );
        Ok(Self::new(manager))
    }

    /// Registers a new connection and sends it the greeting
    pub async fn connect(&self, tunnel: T) -> Id {
        let id = Id::new();
        let mut state = self.inner.lock().await;
        state.tunnels.map.insert(id, tunnel);

        let ServerState {
            manager, tunnels, ..
        } = &mut *state;
        manager.add_connection(id, |id| tunnels.find(id));

        id
    }

    /// Handles one text frame from a connection
    pub async fn on_message(&self, id: Id, frame: &str) {
        let mut state = self.inner.lock().await;
        let mut scheduled = None;
        {
            let ServerState {
                manager, tunnels, ..
            } = &mut *state;
            manager.receive_message(
                id,
                frame,
                |alarm, delay| scheduled = Some((alarm, delay)),
                |id| tunnels.find(id),
            );
        }
        self.sync_countdown(&mut state, scheduled).await;
    }

    /// Handles a connection closing
    pub async fn on_disconnect(&self, id: Id) {
        let mut state = self.inner.lock().await;
        state.tunnels.map.remove(&id);

        let mut scheduled = None;
        {
            let ServerState {
                manager, tunnels, ..
            } = &mut *state;
            manager.remove_connection(
                id,
                |alarm, delay| scheduled = Some((alarm, delay)),
                |id| tunnels.find(id),
            );
        }
        self.sync_countdown(&mut state, scheduled).await;
    }

    /// Stops the countdown, closes every tunnel, and empties the table
    pub async fn shutdown(&self) {
        let mut state = self.inner.lock().await;
        cancel_countdown(&mut *state).await;
        state.generation += 1;

        let ServerState {
            manager, tunnels, ..
        } = &mut *state;
        manager.reset(|id| tunnels.find(id));
        tunnels.map.clear();

        info!("server shut down");
    }

    /// Snapshot of the table as an unprivileged observer sees it
    pub async fn status(&self) -> Status {
        self.inner.lock().await.manager.table().status()
    }

    /// Runs `f` against the manager while holding the lock
    pub async fn inspect<R>(&self, f: impl FnOnce(&TableManager) -> R) -> R {
        f(&self.inner.lock().await.manager)
    }

    /// Replaces, cancels, or keeps the countdown task after a mutation
    async fn sync_countdown(&self, state: &mut ServerState<T>, scheduled: Scheduled) {
        match scheduled {
            Some((alarm, delay)) => {
                cancel_countdown(state).await;
                state.generation += 1;
                state.countdown = Some(self.spawn_countdown(state.generation, alarm, delay));
            }
            None if !state.manager.table().timer().is_running() => {
                cancel_countdown(state).await;
            }
            None => {}
        }
    }

    fn spawn_countdown(
        &self,
        generation: u64,
        alarm: AlarmMessage,
        delay: web_time::Duration,
    ) -> JoinHandle<()> {
        let server = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            server.fire(generation, alarm).await;
        })
    }

    async fn fire(&self, generation: u64, alarm: AlarmMessage) {
        let mut state = self.inner.lock().await;
        if state.generation != generation {
            debug!("countdown task {generation} was superseded");
            return;
        }
        // Our own handle; dropping it detaches rather than aborts.
        state.countdown.take();

        let mut scheduled = None;
        {
            let ServerState {
                manager, tunnels, ..
            } = &mut *state;
            manager.receive_alarm(
                alarm,
                |alarm, delay| scheduled = Some((alarm, delay)),
                |id| tunnels.find(id),
            );
        }
        self.sync_countdown(&mut state, scheduled).await;
    }
}

async fn cancel_countdown<T>(state: &mut ServerState<T>) {
    let Some(handle) = state.countdown.take() else {
        return;
    };
    handle.abort();
    match handle.await {
        Ok(()) => {}
        Err(e) if e.is_cancelled() => debug!("countdown cancelled"),
        Err(e) => warn!("countdown task failed: {e}"),
    }
}

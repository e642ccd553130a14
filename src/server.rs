//! The line-oriented TCP front end.
//!
//! Each connection gets two tasks: a reader that feeds lines through the
//! interpreter and a writer that drains the session's outbound channel.
//! A connection is anonymous until a successful `login`; until then the
//! only accepted command is `login <username> <password>`, and nothing
//! about the world is revealed.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};

use crate::config::Config;
use crate::engine::interpreter::{self, Command};
use crate::engine::SessionRegistry;
use crate::world::store::WorldStore;
use crate::world::types::EntityId;

const GREETING: &str = "Welcome to TextSmith. Log in with: login <username> <password>";

pub struct Server {
    config: Config,
    store: Arc<WorldStore>,
    registry: Arc<SessionRegistry>,
}

impl Server {
    pub fn new(config: Config, store: Arc<WorldStore>) -> Self {
        Self {
            config,
            store,
            registry: Arc::new(SessionRegistry::new()),
        }
    }

    /// Accept connections until the shutdown signal flips.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let listener = TcpListener::bind(&self.config.server.bind)
            .await
            .with_context(|| format!("failed to bind {}", self.config.server.bind))?;
        info!("listening on {}", self.config.server.bind);

        let server = Arc::new(self);
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = accepted.context("accept failed")?;
                    debug!("connection from {}", peer);
                    let server = Arc::clone(&server);
                    tokio::spawn(async move {
                        if let Err(err) = server.handle_connection(stream).await {
                            warn!("session from {} ended with error: {}", peer, err);
                        }
                    });
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("listener shutting down");
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn handle_connection(&self, stream: TcpStream) -> Result<()> {
        let (read_half, mut write_half) = stream.into_split();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        let writer = tokio::spawn(async move {
            while let Some(body) = rx.recv().await {
                if write_half.write_all(body.as_bytes()).await.is_err() {
                    break;
                }
                if write_half.write_all(b"\n").await.is_err() {
                    break;
                }
            }
            let _ = write_half.shutdown().await;
        });

        let _ = tx.send(GREETING.to_string());

        let mut lines = BufReader::new(read_half).lines();
        let mut user: Option<EntityId> = None;
        while let Some(line) = lines.next_line().await? {
            match user {
                None => match self.try_login(&line, &tx) {
                    Some(id) => user = Some(id),
                    None => continue,
                },
                Some(id) => {
                    let messages = interpreter::handle_line(&self.store, id, &line);
                    self.registry.deliver(&self.store, id, &messages);
                }
            }
        }

        if let Some(id) = user {
            self.registry.disconnect_if_current(id, &tx);
            if let Ok(entity) = self.store.get(id) {
                info!("{} logged out", entity.name);
            }
        }
        drop(tx);
        let _ = writer.await;
        Ok(())
    }

    /// Process one pre-authentication line. Returns the user id once a
    /// login succeeds; every failure mode gets the same terse reply.
    fn try_login(&self, line: &str, tx: &mpsc::UnboundedSender<String>) -> Option<EntityId> {
        match interpreter::classify(line) {
            Command::Empty => None,
            Command::Login { username, password } => {
                match self.store.verify_login(&username, &password) {
                    Ok(id) => {
                        if let Err(err) = self.place_on_login(id) {
                            warn!("could not place {} in a room: {}", username, err);
                        }
                        self.registry.connect(id, tx.clone());
                        info!("{} logged in", username);
                        let _ = tx.send(format!("Hello, {}!", username));
                        let messages = interpreter::handle_line(&self.store, id, "look");
                        self.registry.deliver(&self.store, id, &messages);
                        Some(id)
                    }
                    Err(err) => {
                        let _ = tx.send(interpreter::render_error(&err));
                        None
                    }
                }
            }
            _ => {
                let _ = tx.send(GREETING.to_string());
                None
            }
        }
    }

    /// First-time logins start nowhere and land in the configured default
    /// room; returning users keep whatever room they were last in.
    fn place_on_login(&self, user: EntityId) -> Result<()> {
        let room = self
            .store
            .get_by_fqn(&self.config.world.default_room_fqn)
            .with_context(|| {
                format!(
                    "default room {} does not exist",
                    self.config.world.default_room_fqn
                )
            })?;
        self.store.place_if_nowhere(user, room.id)?;
        Ok(())
    }
}

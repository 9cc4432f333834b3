//! Player session module
//!
//! Correlates an external login with the entity it controls:
//! - Session lifecycle (created on join, destroyed on leave)
//! - Heartbeat tracking from the external keep-alive call
//! - Out-of-band reaping of stale sessions
//!
//! The reaper only ever removes session entries. Removing the entity itself
//! is queued as a command so the tick stays the sole writer of entity state.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::command::CommandSender;
use crate::game::entity::EntityId;
use crate::game::world::World;

/// A connected player
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSession {
    pub id: Uuid,
    pub login: String,
    pub entity_id: EntityId,
    /// Outbound broadcast channel for this player
    pub channel: String,
    pub joined_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
}

impl PlayerSession {
    pub fn new(login: impl Into<String>, entity_id: EntityId, now: DateTime<Utc>) -> Self {
        let login = login.into();
        Self {
            id: Uuid::new_v4(),
            channel: format!("player:{}", login),
            login,
            entity_id,
            joined_at: now,
            last_heartbeat: now,
        }
    }

    /// Time since the last heartbeat
    pub fn idle_for(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_heartbeat
    }
}

/// Thread-safe session registry keyed by lowercase login
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, PlayerSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(login: &str) -> String {
        login.to_lowercase()
    }

    /// Register a session; returns `None` if the login is already connected
    pub fn register(
        &self,
        login: &str,
        entity_id: EntityId,
        now: DateTime<Utc>,
    ) -> Option<PlayerSession> {
        let key = Self::key(login);
        if self.sessions.contains_key(&key) {
            return None;
        }

        let session = PlayerSession::new(login, entity_id, now);
        self.sessions.insert(key, session.clone());

        info!(
            login = %login,
            entity_id = entity_id,
            session_id = %session.id,
            "Session registered"
        );

        Some(session)
    }

    pub fn unregister(&self, login: &str) -> Option<PlayerSession> {
        let removed = self.sessions.remove(&Self::key(login)).map(|(_, s)| s);
        if let Some(session) = &removed {
            info!(login = %session.login, entity_id = session.entity_id, "Session unregistered");
        }
        removed
    }

    /// Record a keep-alive; returns false for unknown logins
    pub fn heartbeat(&self, login: &str, now: DateTime<Utc>) -> bool {
        match self.sessions.get_mut(&Self::key(login)) {
            Some(mut session) => {
                session.last_heartbeat = now;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, login: &str) -> Option<PlayerSession> {
        self.sessions.get(&Self::key(login)).map(|s| s.clone())
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Logins whose last heartbeat is older than `max_idle`
    pub fn stale(&self, max_idle: chrono::Duration, now: DateTime<Utc>) -> Vec<String> {
        let mut stale: Vec<String> = self
            .sessions
            .iter()
            .filter(|s| s.idle_for(now) > max_idle)
            .map(|s| s.login.clone())
            .collect();
        stale.sort();
        stale
    }
}

/// Remove stale sessions and queue their entities for removal
pub fn reap_stale_sessions(
    world: &World,
    commands: &CommandSender,
    max_idle: chrono::Duration,
    now: DateTime<Utc>,
) -> usize {
    let mut reaped = 0;
    for login in world.sessions().stale(max_idle, now) {
        if let Some(session) = world.sessions().unregister(&login) {
            reaped += 1;
            if let Err(e) = commands.despawn(session.entity_id) {
                warn!(login = %login, error = %e, "Failed to queue despawn for stale session");
            }
        }
    }
    if reaped > 0 {
        info!(reaped = reaped, "Reaped stale sessions");
    }
    reaped
}

/// Periodically reap stale sessions until shutdown
pub async fn run_session_reaper(
    world: Arc<World>,
    commands: CommandSender,
    heartbeat_timeout: Duration,
    reaper_interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let max_idle =
        chrono::Duration::from_std(heartbeat_timeout).unwrap_or(chrono::Duration::seconds(60));
    let mut ticker = interval(reaper_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                debug!("Running session reaper");
                reap_stale_sessions(&world, &commands, max_idle, Utc::now());
            }
            _ = shutdown_rx.recv() => {
                info!("Session reaper shutting down");
                break;
            }
        }
    }
}

//! Command queue into the tick
//!
//! Anything outside the game loop (move API, join/leave handlers, the session
//! reaper) asks for a change by queueing a [`Command`]. The loop drains the
//! queue at the start of every tick, so registry writes stay on the tick.

use tokio::sync::mpsc;

use crate::error::{Result, ServerError};
use crate::game::entity::{EntityId, EquippedItem};

/// A request to change world state
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Spawn a player entity and open its session
    Join {
        login: String,
        name: String,
        equipment: Vec<EquippedItem>,
        move_speed_bonus: f32,
    },
    /// Close a session and remove its entity
    Leave { login: String },
    /// Send an entity towards a point
    MoveTo { entity: EntityId, x: f32, y: f32 },
    /// Remove an entity without touching sessions
    Despawn { entity: EntityId },
}

impl Command {
    /// Short label for logs
    pub fn name(&self) -> &'static str {
        match self {
            Command::Join { .. } => "join",
            Command::Leave { .. } => "leave",
            Command::MoveTo { .. } => "move_to",
            Command::Despawn { .. } => "despawn",
        }
    }
}

/// Cloneable handle for queueing commands
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::UnboundedSender<Command>,
}

impl CommandSender {
    pub fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| ServerError::Internal("game loop is not running".to_string()))
    }

    pub fn join(&self, login: impl Into<String>, name: impl Into<String>) -> Result<()> {
        self.send(Command::Join {
            login: login.into(),
            name: name.into(),
            equipment: Vec::new(),
            move_speed_bonus: 0.0,
        })
    }

    pub fn leave(&self, login: impl Into<String>) -> Result<()> {
        self.send(Command::Leave {
            login: login.into(),
        })
    }

    pub fn move_to(&self, entity: EntityId, x: f32, y: f32) -> Result<()> {
        self.send(Command::MoveTo { entity, x, y })
    }

    pub fn despawn(&self, entity: EntityId) -> Result<()> {
        self.send(Command::Despawn { entity })
    }
}

/// Receiving end, owned by the game loop
#[derive(Debug)]
pub struct CommandQueue {
    rx: mpsc::UnboundedReceiver<Command>,
}

impl CommandQueue {
    /// Take every queued command without waiting
    pub fn drain(&mut self) -> Vec<Command> {
        let mut commands = Vec::new();
        while let Ok(command) = self.rx.try_recv() {
            commands.push(command);
        }
        commands
    }
}

/// Create a connected sender/queue pair
pub fn channel() -> (CommandSender, CommandQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CommandSender { tx }, CommandQueue { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_preserves_order() {
        let (sender, mut queue) = channel();
        sender.join("alice", "Alice").unwrap();
        sender.move_to(3, 10.0, 20.0).unwrap();
        sender.leave("alice").unwrap();

        let drained = queue.drain();
        assert_eq!(drained.len(), 3);
        assert!(matches!(drained[0], Command::Join { .. }));
        assert_eq!(drained[1], Command::MoveTo { entity: 3, x: 10.0, y: 20.0 });
        assert_eq!(drained[2].name(), "leave");
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_send_after_queue_dropped() {
        let (sender, queue) = channel();
        drop(queue);
        assert!(sender.despawn(1).is_err());
    }
}

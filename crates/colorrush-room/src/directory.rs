//! The room directory: room id → room.
//!
//! The directory is constructed explicitly and handed to whatever accepts
//! connections, so tests can run with isolated directories.
//!
//! Lock ordering: the directory lock is never held while waiting on a
//! room's lock. Emptiness is read from the room's lock-free occupancy
//! counter instead.
//!
//! # How eviction stays race-free
//!
//! A joining connection looks the room up first and only then adds its
//! player, with no lock held in between. Meanwhile the last member of
//! that room may be leaving, and its cleanup wants to evict the room. If
//! both went ahead naively, the joiner could land in a room that is no
//! longer listed, a member nobody else can ever reach.
//!
//! Two atomics on each [`Room`] settle this without a shared lock:
//!
//! ```text
//! joiner (Room::add_player)          evictor (Room::try_retire)
//! -------------------------          --------------------------
//! occupancy += 1                     retired = true
//! if retired { occupancy -= 1;       if occupancy > 0 { retired = false;
//!              RoomNotFound }                           keep the room }
//! ```
//!
//! Both sides write their own flag before reading the other's, with
//! sequentially consistent ordering, so at least one of them sees the
//! other. Either the evictor backs off, or the joiner is refused with
//! [`RoomError::RoomNotFound`] and the room disappears. A refused host
//! simply looks the id up again and gets a fresh room.

use std::collections::HashMap;
use std::sync::Arc;

use colorrush_protocol::RoomId;
use tokio::sync::Mutex;

use crate::{Room, RoomConfig, RoomError};

/// Registry of live rooms.
#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: Mutex<HashMap<RoomId, Arc<Room>>>,
    config: RoomConfig,
}

impl RoomDirectory {
    /// Creates an empty directory whose rooms use `config`.
    pub fn new(config: RoomConfig) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub async fn get(&self, id: &RoomId) -> Result<Arc<Room>, RoomError> {
        self.rooms
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| RoomError::RoomNotFound(id.clone()))
    }

    /// Registers a new empty room.
    ///
    /// # Errors
    /// [`RoomError::RoomExists`] if the id is taken. Existing rooms are
    /// never replaced.
    pub async fn create(&self, id: RoomId) -> Result<Arc<Room>, RoomError> {
        let mut rooms = self.rooms.lock().await;
        if rooms.contains_key(&id) {
            return Err(RoomError::RoomExists(id));
        }
        let room = Arc::new(Room::new(id.clone(), self.config.clone()));
        rooms.insert(id.clone(), Arc::clone(&room));
        tracing::info!(room_id = %id, rooms = rooms.len(), "room created");
        Ok(room)
    }

    /// Returns the room registered under `id`, creating it if needed.
    pub async fn get_or_create(&self, id: RoomId) -> Arc<Room> {
        let mut rooms = self.rooms.lock().await;
        if let Some(room) = rooms.get(&id) {
            return Arc::clone(room);
        }
        let room = Arc::new(Room::new(id.clone(), self.config.clone()));
        rooms.insert(id.clone(), Arc::clone(&room));
        tracing::info!(room_id = %id, rooms = rooms.len(), "room created");
        room
    }

    /// Drops a room from the directory. Connections already holding it
    /// keep working, but no one can join it any more.
    pub async fn remove(&self, id: &RoomId) -> Option<Arc<Room>> {
        let room = self.rooms.lock().await.remove(id)?;
        room.retire();
        tracing::info!(room_id = %id, "room removed");
        Some(room)
    }

    /// Snapshot of every registered room.
    pub async fn list(&self) -> Vec<Arc<Room>> {
        self.rooms.lock().await.values().cloned().collect()
    }

    /// Removes every room that nobody is in or joining. Returns how many
    /// were removed.
    pub async fn evict_empty(&self) -> usize {
        let mut rooms = self.rooms.lock().await;
        let before = rooms.len();
        rooms.retain(|id, room| {
            let keep = !room.try_retire();
            if !keep {
                tracing::info!(room_id = %id, "room evicted");
            }
            keep
        });
        before - rooms.len()
    }

    /// Removes one room if it is empty. Returns `true` if it was removed.
    pub async fn evict_if_empty(&self, id: &RoomId) -> bool {
        let mut rooms = self.rooms.lock().await;
        let empty = rooms.get(id).is_some_and(|room| room.try_retire());
        if empty {
            rooms.remove(id);
            tracing::info!(room_id = %id, "room evicted");
        }
        empty
    }

    pub async fn len(&self) -> usize {
        self.rooms.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.lock().await.is_empty()
    }
}

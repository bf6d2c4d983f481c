//! In-process realtime service
//!
//! Implements the backend side of matchmaking for clients living in the same
//! process: a shared room registry, random joins that fail when no open room
//! exists, room creation, leaving and disconnecting. Outcomes are delivered as
//! backend callbacks through each client's matchmaking handle, never inline.

use crate::backend::callback::{BackendCallback, CurrentRoom, NO_RANDOM_MATCH_FOUND};
use crate::backend::RealtimeBackend;
use crate::error::{MatchmakingError, Result};
use crate::matchmaking::MatchmakingHandle;
use crate::types::{DisconnectCause, RoomId, RoomOptions};
use crate::utils::generate_room_id;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// Identifier of a client registered with the local service
pub type ClientId = u64;

/// Behaviour switches for the local service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalServiceConfig {
    /// When false, random joins may land in rooms that are already full
    pub enforce_capacity: bool,
}

impl Default for LocalServiceConfig {
    fn default() -> Self {
        Self {
            enforce_capacity: true,
        }
    }
}

/// Statistics about local service operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalServiceStats {
    pub connections: u64,
    pub rooms_created: u64,
    pub random_joins: u64,
    pub random_join_failures: u64,
    pub rooms_left: u64,
}

/// Public view of a room held by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRoomInfo {
    pub room_id: RoomId,
    pub game_version: String,
    pub max_players: u8,
    pub members: Vec<ClientId>,
    pub loaded_level: Option<String>,
}

#[derive(Debug)]
struct LocalRoom {
    id: RoomId,
    game_version: String,
    max_players: u8,
    members: Vec<ClientId>,
    loaded_level: Option<String>,
    sequence: u64,
}

impl LocalRoom {
    fn current_room(&self) -> CurrentRoom {
        CurrentRoom {
            name: self.id.clone(),
            player_count: self.members.len() as u32,
            max_players: self.max_players,
        }
    }

    fn info(&self) -> LocalRoomInfo {
        LocalRoomInfo {
            room_id: self.id.clone(),
            game_version: self.game_version.clone(),
            max_players: self.max_players,
            members: self.members.clone(),
            loaded_level: self.loaded_level.clone(),
        }
    }
}

#[derive(Debug)]
struct ClientEntry {
    handle: MatchmakingHandle,
    connected: bool,
    game_version: String,
    room: Option<RoomId>,
}

#[derive(Debug, Default)]
struct Registry {
    clients: HashMap<ClientId, ClientEntry>,
    rooms: HashMap<RoomId, LocalRoom>,
    next_client_id: ClientId,
    next_room_sequence: u64,
    stats: LocalServiceStats,
}

/// Callbacks collected under the registry lock and delivered after release
type Outbox = Vec<(MatchmakingHandle, BackendCallback)>;

impl Registry {
    fn client(&self, id: ClientId) -> Result<&ClientEntry> {
        self.clients.get(&id).ok_or_else(|| {
            MatchmakingError::InternalError {
                message: format!("Unknown local client {}", id),
            }
            .into()
        })
    }

    fn client_mut(&mut self, id: ClientId) -> Result<&mut ClientEntry> {
        self.clients.get_mut(&id).ok_or_else(|| {
            MatchmakingError::InternalError {
                message: format!("Unknown local client {}", id),
            }
            .into()
        })
    }

    fn connected_client(&self, id: ClientId) -> Result<&ClientEntry> {
        let client = self.client(id)?;
        if !client.connected {
            return Err(MatchmakingError::NotConnected.into());
        }
        Ok(client)
    }

    /// Oldest open room for `game_version`
    fn find_open_room(&self, game_version: &str, enforce_capacity: bool) -> Option<RoomId> {
        self.rooms
            .values()
            .filter(|room| room.game_version == game_version)
            .filter(|room| !enforce_capacity || room.members.len() < room.max_players as usize)
            .min_by_key(|room| room.sequence)
            .map(|room| room.id.clone())
    }

    /// Add `client_id` to `room_id` and queue the join callbacks
    fn join(&mut self, client_id: ClientId, room_id: &RoomId, outbox: &mut Outbox) -> Result<()> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| MatchmakingError::RoomNotFound {
                room_id: room_id.clone(),
            })?;
        room.members.push(client_id);
        let current_room = room.current_room();
        let others: Vec<ClientId> = room
            .members
            .iter()
            .copied()
            .filter(|id| *id != client_id)
            .collect();

        self.client_mut(client_id)?.room = Some(room_id.clone());

        outbox.push((
            self.client(client_id)?.handle.clone(),
            BackendCallback::JoinedRoom {
                current_room: current_room.clone(),
            },
        ));
        for other in others {
            if let Ok(entry) = self.client(other) {
                outbox.push((
                    entry.handle.clone(),
                    BackendCallback::PlayerEnteredRoom {
                        current_room: current_room.clone(),
                    },
                ));
            }
        }
        Ok(())
    }

    /// Remove `client_id` from its room, notifying remaining members
    fn remove_from_room(&mut self, client_id: ClientId, outbox: &mut Outbox) -> Result<RoomId> {
        let room_id = self
            .client_mut(client_id)?
            .room
            .take()
            .ok_or(MatchmakingError::NotInRoom)?;

        let mut now_empty = false;
        if let Some(room) = self.rooms.get_mut(&room_id) {
            room.members.retain(|id| *id != client_id);
            now_empty = room.members.is_empty();
            let current_room = room.current_room();
            let members = room.members.clone();
            for member in members {
                if let Ok(entry) = self.client(member) {
                    outbox.push((
                        entry.handle.clone(),
                        BackendCallback::PlayerLeftRoom {
                            current_room: current_room.clone(),
                        },
                    ));
                }
            }
        }
        if now_empty {
            self.rooms.remove(&room_id);
            debug!("Local room {} closed", room_id);
        }

        self.stats.rooms_left += 1;
        Ok(room_id)
    }
}

/// Shared in-process realtime service
#[derive(Debug, Clone, Default)]
pub struct LocalRealtimeService {
    registry: Arc<RwLock<Registry>>,
    config: LocalServiceConfig,
}

impl LocalRealtimeService {
    pub fn new(config: LocalServiceConfig) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry::default())),
            config,
        }
    }

    /// Register a client whose callbacks go to `handle`
    pub fn register_client(&self, handle: MatchmakingHandle) -> LocalBackendClient {
        let mut registry = self.write();
        registry.next_client_id += 1;
        let id = registry.next_client_id;
        registry.clients.insert(
            id,
            ClientEntry {
                handle,
                connected: false,
                game_version: String::new(),
                room: None,
            },
        );
        debug!("Local client {} registered", id);

        LocalBackendClient {
            id,
            service: self.clone(),
        }
    }

    /// Forget a client, removing it from its room first
    ///
    /// Remaining room members hear about the departure. The client's handle is
    /// released, so its controller stops once no other handle is alive.
    pub fn unregister_client(&self, client_id: ClientId) -> Result<()> {
        let mut outbox = Outbox::new();
        {
            let mut registry = self.write();
            if registry.client(client_id)?.room.is_some() {
                registry.remove_from_room(client_id, &mut outbox)?;
            }
            registry.clients.remove(&client_id);
        }
        debug!("Local client {} unregistered", client_id);
        deliver(outbox);
        Ok(())
    }

    /// All rooms currently held by the service
    pub fn rooms(&self) -> Vec<LocalRoomInfo> {
        let registry = self.read();
        let mut rooms: Vec<&LocalRoom> = registry.rooms.values().collect();
        rooms.sort_by_key(|room| room.sequence);
        rooms.into_iter().map(LocalRoom::info).collect()
    }

    /// The room a client is currently in
    pub fn room_of(&self, client_id: ClientId) -> Option<LocalRoomInfo> {
        let registry = self.read();
        let room_id = registry.clients.get(&client_id)?.room.clone()?;
        registry.rooms.get(&room_id).map(LocalRoom::info)
    }

    /// Service statistics
    pub fn stats(&self) -> LocalServiceStats {
        self.read().stats.clone()
    }

    /// Drop a client's connection from the service side
    pub fn drop_connection(&self, client_id: ClientId, cause: DisconnectCause) -> Result<()> {
        let mut outbox = Outbox::new();
        {
            let mut registry = self.write();
            if registry.client(client_id)?.room.is_some() {
                registry.remove_from_room(client_id, &mut outbox)?;
            }
            let client = registry.client_mut(client_id)?;
            client.connected = false;
            outbox.push((
                client.handle.clone(),
                BackendCallback::Disconnected { cause },
            ));
        }
        warn!("Local client {} dropped: {:?}", client_id, cause);
        deliver(outbox);
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn deliver(outbox: Outbox) {
    for (handle, callback) in outbox {
        if let Err(e) = handle.deliver_callback(callback) {
            debug!("Dropping callback for stopped client: {}", e);
        }
    }
}

/// A client's connection to the local service
#[derive(Debug, Clone)]
pub struct LocalBackendClient {
    id: ClientId,
    service: LocalRealtimeService,
}

impl LocalBackendClient {
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Run `f` under the registry lock, then deliver what it queued
    fn with_registry<T>(&self, f: impl FnOnce(&mut Registry, &mut Outbox) -> Result<T>) -> Result<T> {
        let mut outbox = Outbox::new();
        let result = {
            let mut registry = self.service.write();
            f(&mut registry, &mut outbox)
        };
        deliver(outbox);
        result
    }
}

#[async_trait]
impl RealtimeBackend for LocalBackendClient {
    fn is_connected(&self) -> bool {
        self.service
            .read()
            .clients
            .get(&self.id)
            .map(|client| client.connected)
            .unwrap_or(false)
    }

    async fn set_game_version(&self, version: String) -> Result<()> {
        self.with_registry(|registry, _| {
            registry.client_mut(self.id)?.game_version = version;
            Ok(())
        })
    }

    async fn connect_using_settings(&self) -> Result<()> {
        self.with_registry(|registry, outbox| {
            let client = registry.client_mut(self.id)?;
            client.connected = true;
            outbox.push((client.handle.clone(), BackendCallback::ConnectedToMaster));
            registry.stats.connections += 1;
            info!("Local client {} connected to master", self.id);
            Ok(())
        })
    }

    async fn join_random_room(&self) -> Result<()> {
        let enforce_capacity = self.service.config.enforce_capacity;
        self.with_registry(|registry, outbox| {
            let game_version = registry.connected_client(self.id)?.game_version.clone();
            registry.stats.random_joins += 1;

            match registry.find_open_room(&game_version, enforce_capacity) {
                Some(room_id) => registry.join(self.id, &room_id, outbox),
                None => {
                    registry.stats.random_join_failures += 1;
                    outbox.push((
                        registry.client(self.id)?.handle.clone(),
                        BackendCallback::JoinRandomFailed {
                            return_code: NO_RANDOM_MATCH_FOUND,
                            message: "No match found".to_string(),
                        },
                    ));
                    Ok(())
                }
            }
        })
    }

    async fn create_room(&self, name: Option<String>, options: RoomOptions) -> Result<()> {
        self.with_registry(|registry, outbox| {
            let game_version = registry.connected_client(self.id)?.game_version.clone();
            let room_id = name.unwrap_or_else(generate_room_id);
            if registry.rooms.contains_key(&room_id) {
                return Err(MatchmakingError::RoomAlreadyExists { room_id }.into());
            }

            registry.next_room_sequence += 1;
            let sequence = registry.next_room_sequence;
            registry.rooms.insert(
                room_id.clone(),
                LocalRoom {
                    id: room_id.clone(),
                    game_version,
                    max_players: options.max_players,
                    members: Vec::new(),
                    loaded_level: None,
                    sequence,
                },
            );
            registry.stats.rooms_created += 1;
            info!(
                "Local room {} created by client {} ({} players max)",
                room_id, self.id, options.max_players
            );

            registry.join(self.id, &room_id, outbox)
        })
    }

    async fn leave_room(&self) -> Result<()> {
        self.with_registry(|registry, outbox| {
            let room_id = registry.remove_from_room(self.id, outbox)?;
            info!("Local client {} left room {}", self.id, room_id);

            // Leaving a room puts the client back on the master server
            let client = registry.client(self.id)?;
            if client.connected {
                outbox.push((client.handle.clone(), BackendCallback::ConnectedToMaster));
            }
            Ok(())
        })
    }

    async fn load_level(&self, scene: String) -> Result<()> {
        self.with_registry(|registry, _| {
            let room_id = registry
                .client(self.id)?
                .room
                .clone()
                .ok_or(MatchmakingError::NotInRoom)?;
            let room = registry
                .rooms
                .get_mut(&room_id)
                .ok_or(MatchmakingError::RoomNotFound {
                    room_id: room_id.clone(),
                })?;
            info!("Room {} loading level '{}'", room_id, scene);
            room.loaded_level = Some(scene);
            Ok(())
        })
    }

    async fn disconnect(&self) -> Result<()> {
        self.with_registry(|registry, outbox| {
            if registry.client(self.id)?.room.is_some() {
                registry.remove_from_room(self.id, outbox)?;
            }
            let client = registry.client_mut(self.id)?;
            client.connected = false;
            outbox.push((
                client.handle.clone(),
                BackendCallback::Disconnected {
                    cause: DisconnectCause::DisconnectByClientLogic,
                },
            ));
            info!("Local client {} disconnected", self.id);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MatchmakingEvent, MatchmakingInput};

    fn options() -> RoomOptions {
        RoomOptions { max_players: 2 }
    }

    async fn connected_client(
        service: &LocalRealtimeService,
        version: &str,
    ) -> (LocalBackendClient, crate::matchmaking::MatchmakingInbox) {
        let (handle, inbox) = MatchmakingHandle::channel();
        let client = service.register_client(handle);
        client.set_game_version(version.to_string()).await.unwrap();
        client.connect_using_settings().await.unwrap();
        (client, inbox)
    }

    fn drain(inbox: &mut crate::matchmaking::MatchmakingInbox) -> Vec<MatchmakingInput> {
        let mut inputs = Vec::new();
        while let Some(input) = inbox.try_recv() {
            inputs.push(input);
        }
        inputs
    }

    #[tokio::test]
    async fn test_connect_reports_connected_to_master() {
        let service = LocalRealtimeService::default();
        let (client, mut inbox) = connected_client(&service, "0.0.1").await;

        assert!(client.is_connected());
        assert_eq!(
            drain(&mut inbox),
            vec![MatchmakingInput::Backend(MatchmakingEvent::ConnectedToMaster)]
        );
        assert_eq!(service.stats().connections, 1);
    }

    #[tokio::test]
    async fn test_join_random_without_rooms_fails() {
        let service = LocalRealtimeService::default();
        let (client, mut inbox) = connected_client(&service, "0.0.1").await;
        drain(&mut inbox);

        client.join_random_room().await.unwrap();

        match drain(&mut inbox).as_slice() {
            [MatchmakingInput::Backend(MatchmakingEvent::JoinRandomFailed { code, .. })] => {
                assert_eq!(*code, NO_RANDOM_MATCH_FOUND)
            }
            other => panic!("unexpected inputs {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_join_random_requires_connection() {
        let service = LocalRealtimeService::default();
        let (handle, _inbox) = MatchmakingHandle::channel();
        let client = service.register_client(handle);

        assert!(!client.is_connected());
        assert!(client.join_random_room().await.is_err());
    }

    #[tokio::test]
    async fn test_second_client_joins_created_room() {
        let service = LocalRealtimeService::default();
        let (creator, mut creator_inbox) = connected_client(&service, "0.0.1").await;
        let (joiner, mut joiner_inbox) = connected_client(&service, "0.0.1").await;
        drain(&mut creator_inbox);
        drain(&mut joiner_inbox);

        creator.create_room(None, options()).await.unwrap();
        joiner.join_random_room().await.unwrap();

        let rooms = service.rooms();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].members, vec![creator.id(), joiner.id()]);

        let creator_inputs = drain(&mut creator_inbox);
        assert_eq!(creator_inputs.len(), 2);
        assert!(matches!(
            &creator_inputs[1],
            MatchmakingInput::Backend(MatchmakingEvent::PlayerEnteredRoom { room })
                if room.player_count == 2
        ));

        match drain(&mut joiner_inbox).as_slice() {
            [MatchmakingInput::Backend(MatchmakingEvent::JoinedRoom { room })] => {
                assert_eq!(room.player_count, 2)
            }
            other => panic!("unexpected inputs {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_full_rooms_are_skipped_when_capacity_enforced() {
        let service = LocalRealtimeService::default();
        let (a, _ia) = connected_client(&service, "0.0.1").await;
        let (b, _ib) = connected_client(&service, "0.0.1").await;
        let (c, mut ic) = connected_client(&service, "0.0.1").await;
        drain(&mut ic);

        a.create_room(None, options()).await.unwrap();
        b.join_random_room().await.unwrap();
        c.join_random_room().await.unwrap();

        assert!(matches!(
            drain(&mut ic).as_slice(),
            [MatchmakingInput::Backend(MatchmakingEvent::JoinRandomFailed { .. })]
        ));
    }

    #[tokio::test]
    async fn test_full_rooms_accept_joins_without_capacity_enforcement() {
        let service = LocalRealtimeService::new(LocalServiceConfig {
            enforce_capacity: false,
        });
        let (a, _ia) = connected_client(&service, "0.0.1").await;
        let (b, _ib) = connected_client(&service, "0.0.1").await;
        let (c, mut ic) = connected_client(&service, "0.0.1").await;
        drain(&mut ic);

        a.create_room(None, options()).await.unwrap();
        b.join_random_room().await.unwrap();
        c.join_random_room().await.unwrap();

        assert!(matches!(
            drain(&mut ic).as_slice(),
            [MatchmakingInput::Backend(MatchmakingEvent::JoinedRoom { room })] if room.player_count == 3
        ));
    }

    #[tokio::test]
    async fn test_game_versions_are_segregated() {
        let service = LocalRealtimeService::default();
        let (old, _io) = connected_client(&service, "0.0.1").await;
        let (new, mut inew) = connected_client(&service, "0.0.2").await;
        drain(&mut inew);

        old.create_room(None, options()).await.unwrap();
        new.join_random_room().await.unwrap();

        assert!(matches!(
            drain(&mut inew).as_slice(),
            [MatchmakingInput::Backend(MatchmakingEvent::JoinRandomFailed { .. })]
        ));
    }

    #[tokio::test]
    async fn test_leave_room_returns_to_master_and_closes_empty_room() {
        let service = LocalRealtimeService::default();
        let (client, mut inbox) = connected_client(&service, "0.0.1").await;
        client.create_room(Some("duo-room".to_string()), options()).await.unwrap();
        client.load_level("Room for 2".to_string()).await.unwrap();
        assert_eq!(
            service.room_of(client.id()).and_then(|r| r.loaded_level),
            Some("Room for 2".to_string())
        );
        drain(&mut inbox);

        client.leave_room().await.unwrap();

        assert!(service.rooms().is_empty());
        assert_eq!(
            drain(&mut inbox),
            vec![MatchmakingInput::Backend(MatchmakingEvent::ConnectedToMaster)]
        );
        assert!(client.leave_room().await.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_room_name_rejected() {
        let service = LocalRealtimeService::default();
        let (a, _ia) = connected_client(&service, "0.0.1").await;
        let (b, _ib) = connected_client(&service, "0.0.1").await;

        a.create_room(Some("room".to_string()), options()).await.unwrap();
        let err = b
            .create_room(Some("room".to_string()), options())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_disconnect_notifies_room_and_client() {
        let service = LocalRealtimeService::default();
        let (a, mut ia) = connected_client(&service, "0.0.1").await;
        let (b, mut ib) = connected_client(&service, "0.0.1").await;
        a.create_room(None, options()).await.unwrap();
        b.join_random_room().await.unwrap();
        drain(&mut ia);
        drain(&mut ib);

        b.disconnect().await.unwrap();

        assert!(!b.is_connected());
        assert_eq!(
            drain(&mut ib),
            vec![MatchmakingInput::Backend(MatchmakingEvent::Disconnected {
                cause: DisconnectCause::DisconnectByClientLogic
            })]
        );
        assert!(matches!(
            drain(&mut ia).as_slice(),
            [MatchmakingInput::Backend(MatchmakingEvent::PlayerLeftRoom { room })] if room.player_count == 1
        ));
    }

    #[tokio::test]
    async fn test_unregister_releases_client_and_its_seat() {
        let service = LocalRealtimeService::default();
        let (a, mut ia) = connected_client(&service, "0.0.1").await;
        let (b, mut ib) = connected_client(&service, "0.0.1").await;
        a.create_room(None, options()).await.unwrap();
        b.join_random_room().await.unwrap();
        drain(&mut ia);
        drain(&mut ib);

        service.unregister_client(a.id()).unwrap();

        assert!(!a.is_connected());
        assert_eq!(service.room_of(b.id()).map(|r| r.members), Some(vec![b.id()]));
        assert!(matches!(
            drain(&mut ib).as_slice(),
            [MatchmakingInput::Backend(MatchmakingEvent::PlayerLeftRoom { room })] if room.player_count == 1
        ));

        // The service held the only handle, so the inbox is now closed
        assert_eq!(ia.recv().await, None);
        assert!(service.unregister_client(a.id()).is_err());
        assert!(a.join_random_room().await.is_err());
    }

    #[tokio::test]
    async fn test_drop_connection_reports_cause() {
        let service = LocalRealtimeService::default();
        let (client, mut inbox) = connected_client(&service, "0.0.1").await;
        drain(&mut inbox);

        service
            .drop_connection(client.id(), DisconnectCause::ServerTimeout)
            .unwrap();

        assert_eq!(
            drain(&mut inbox),
            vec![MatchmakingInput::Backend(MatchmakingEvent::Disconnected {
                cause: DisconnectCause::ServerTimeout
            })]
        );
    }
}

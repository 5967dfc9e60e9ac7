//! The Room Registry: the code-to-actor mapping, and nothing else. Grounded
//! on the teacher's `relay_server.rs` `RelayServer::get_room` (create rooms
//! on demand, hand back a handle, guard the map with one mutex) — generalized
//! from one implicit room to many, keyed by room code.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::time::interval;

use crate::config::RoomTimers;
use crate::error::{RoomError, RoomResult};
use crate::hub::Hub;
use crate::model::{generate_room_code, RoomCode, RoomKind, RoomPrivacy};
use crate::room_actor::{spawn_room, RoomHandle};
use crate::sfu::SfuBridge;

const ROOM_CODE_RETRY_LIMIT: usize = 16;

pub struct RoomRegistry {
    rooms: StdMutex<HashMap<RoomCode, RoomHandle>>,
    hub: Arc<Hub>,
    timers: RoomTimers,
    chat_history_limit: usize,
}

impl RoomRegistry {
    pub fn new(hub: Arc<Hub>, timers: RoomTimers, chat_history_limit: usize) -> Arc<Self> {
        Arc::new(Self {
            rooms: StdMutex::new(HashMap::new()),
            hub,
            timers,
            chat_history_limit,
        })
    }

    /// Allocates a fresh room code (retrying on collision) and spawns its
    /// actor. Bounded retry turns an astronomically unlikely exhaustion into
    /// an `internal` error instead of looping forever.
    pub fn create_room(&self, name: String, kind: RoomKind, privacy: RoomPrivacy) -> RoomResult<RoomHandle> {
        let mut rooms = self.rooms.lock().unwrap();
        for _ in 0..ROOM_CODE_RETRY_LIMIT {
            let code = generate_room_code();
            if rooms.contains_key(&code) {
                continue;
            }
            let handle = spawn_room(
                code.clone(),
                name,
                kind,
                privacy,
                self.chat_history_limit,
                self.timers,
                self.hub.clone(),
            );
            rooms.insert(code, handle.clone());
            return Ok(handle);
        }
        Err(RoomError::Internal("room code space exhausted".into()))
    }

    pub fn get(&self, code: &str) -> RoomResult<RoomHandle> {
        self.rooms
            .lock()
            .unwrap()
            .get(code)
            .cloned()
            .ok_or(RoomError::NotFound)
    }

    fn remove(&self, code: &str) {
        self.rooms.lock().unwrap().remove(code);
    }

    fn all_handles(&self) -> Vec<RoomHandle> {
        self.rooms.lock().unwrap().values().cloned().collect()
    }

    /// Periodically destroys rooms with no participants, no active SFU
    /// producers and an idle duration past the configured timeout.
    pub fn spawn_reaper(self: Arc<Self>, sfu: Arc<SfuBridge>) {
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(5));
            loop {
                ticker.tick().await;
                for handle in self.all_handles() {
                    let Ok(idle) = handle.query_idle().await else { continue };
                    if !idle.empty_of_participants || idle.idle_for < self.timers.idle_timeout {
                        continue;
                    }
                    if sfu.has_producers(&handle.code) {
                        continue;
                    }
                    log::info!("reaping idle room {}", handle.code);
                    sfu.destroy_room(&handle.code);
                    self.remove(&handle.code);
                }
            }
        });
    }
}

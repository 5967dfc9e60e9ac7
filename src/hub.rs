//! Tracks live connections so that [`crate::room_actor::RoomActor`]s and the
//! [`crate::sfu::SfuBridge`] can push frames to a specific session without
//! knowing anything about the transport underneath it. Generalizes the
//! teacher's per-session outbound channel (`session.rs`'s `on_closed`
//! callback registry) into an explicit registry keyed by session id.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::model::SessionId;
use crate::protocol::OutboundFrame;

#[derive(Default)]
pub struct Hub {
    senders: Mutex<HashMap<SessionId, mpsc::UnboundedSender<OutboundFrame>>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session_id: SessionId, sender: mpsc::UnboundedSender<OutboundFrame>) {
        self.senders.lock().unwrap().insert(session_id, sender);
    }

    pub fn unregister(&self, session_id: SessionId) {
        self.senders.lock().unwrap().remove(&session_id);
    }

    /// Send to one session. Silently drops if the session has disconnected;
    /// a single failed emit never blocks or aborts a caller's broadcast loop.
    pub fn emit(&self, session_id: SessionId, frame: OutboundFrame) {
        let sender = self.senders.lock().unwrap().get(&session_id).cloned();
        if let Some(sender) = sender {
            if sender.send(frame).is_err() {
                log::debug!("dropped emit to disconnected session {session_id}");
            }
        }
    }

    pub fn broadcast(&self, session_ids: &[SessionId], frame_factory: impl Fn() -> OutboundFrame) {
        for &id in session_ids {
            self.emit(id, frame_factory());
        }
    }
}

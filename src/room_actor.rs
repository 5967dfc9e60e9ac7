//! The Room Actor: a single-writer state machine for one room.
//!
//! All mutation flows through [`RoomCommand`]s delivered over an `mpsc`
//! channel and drained by one task (`RoomActor::run`), generalizing the
//! teacher's process-wide actor-loop precedent
//! (`other_examples`' `RealtimeServer::run`, a `tokio::select!` over a
//! command receiver plus a periodic timer) down to one instance per room.
//! This is what lets different rooms progress fully in parallel while each
//! room's own chat/playback/participant tables need no internal locking.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;
use uuid::Uuid;

use crate::config::RoomTimers;
use crate::error::{RoomError, RoomResult};
use crate::hub::Hub;
use crate::model::{
    Identity, Media, Message, MessageKind, Participant, ReactionTally, Room, RoomCode, RoomKind,
    RoomPrivacy, SessionId,
};
use crate::protocol::*;

pub struct JoinOutcome {
    pub snapshot: RoomSnapshot,
    pub is_reconnect: bool,
}

pub enum RoomCommand {
    Join {
        identity: Identity,
        name: String,
        avatar: String,
        session_id: SessionId,
        reply: oneshot::Sender<RoomResult<JoinOutcome>>,
    },
    Leave {
        session_id: SessionId,
    },
    SendMessage {
        identity: Identity,
        content: String,
        reply_to: Option<String>,
    },
    EditMessage {
        identity: Identity,
        id: String,
        new_content: String,
    },
    DeleteMessage {
        identity: Identity,
        id: String,
    },
    AddReaction {
        identity: Identity,
        id: String,
        emoji: String,
    },
    SendReaction {
        identity: Identity,
        emoji: String,
    },
    Typing {
        identity: Identity,
        is_typing: bool,
    },
    UpdatePlayback {
        identity: Identity,
        action: PlaybackAction,
        is_playing: bool,
        current_time: f64,
        media: Option<MediaInput>,
    },
    SyncRequest {
        reply: oneshot::Sender<RoomResult<SyncState>>,
    },
    ToggleLock {
        identity: Identity,
    },
    TransferHost {
        identity: Identity,
        target: Identity,
    },
    KickUser {
        identity: Identity,
        target: Identity,
    },
    ScreenShareStart {
        identity: Identity,
    },
    ScreenShareStop {
        identity: Identity,
    },
    ScreenShareReady {
        identity: Identity,
        session_id: SessionId,
    },
    ScreenShareOffer {
        from_session: SessionId,
        to: SessionId,
        offer: Value,
    },
    ScreenShareAnswer {
        from_session: SessionId,
        to: SessionId,
        answer: Value,
    },
    ScreenShareIce {
        from_session: SessionId,
        to: SessionId,
        candidate: Value,
    },
    VoiceJoined {
        identity: Identity,
    },
    VoiceLeft {
        identity: Identity,
    },
    QueryIdle {
        reply: oneshot::Sender<IdleStatus>,
    },
    Snapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },
}

pub struct IdleStatus {
    pub empty_of_participants: bool,
    pub idle_for: Duration,
}

/// A cheap, cloneable handle other components use to reach a room's actor.
#[derive(Clone)]
pub struct RoomHandle {
    pub code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
    /// Shadow of `session_id -> identity` for participants, kept in sync by
    /// the actor on every join/leave so the SFU bridge can authorize and
    /// label producers without an async round-trip per RPC.
    pub members: Arc<StdMutex<HashMap<SessionId, Identity>>>,
}

impl RoomHandle {
    pub async fn join(
        &self,
        identity: Identity,
        name: String,
        avatar: String,
        session_id: SessionId,
    ) -> RoomResult<JoinOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Join {
            identity,
            name,
            avatar,
            session_id,
            reply,
        })
        .await?;
        rx.await.map_err(|_| RoomError::Internal("actor gone".into()))?
    }

    pub async fn leave(&self, session_id: SessionId) {
        let _ = self.sender.send(RoomCommand::Leave { session_id }).await;
    }

    pub async fn sync_request(&self) -> RoomResult<SyncState> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::SyncRequest { reply }).await?;
        rx.await.map_err(|_| RoomError::Internal("actor gone".into()))?
    }

    pub async fn snapshot(&self) -> RoomResult<RoomSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| RoomError::Internal("actor gone".into()))
    }

    pub async fn query_idle(&self) -> RoomResult<IdleStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::QueryIdle { reply }).await?;
        rx.await.map_err(|_| RoomError::Internal("actor gone".into()))
    }

    pub fn is_member(&self, session_id: SessionId) -> bool {
        self.members.lock().unwrap().contains_key(&session_id)
    }

    pub fn identity_of(&self, session_id: SessionId) -> Option<Identity> {
        self.members.lock().unwrap().get(&session_id).cloned()
    }

    pub async fn dispatch(&self, cmd: RoomCommand) -> RoomResult<()> {
        self.send(cmd).await
    }

    async fn send(&self, cmd: RoomCommand) -> RoomResult<()> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| RoomError::Internal("room actor not running".into()))
    }
}

pub struct RoomActor {
    room: Room,
    hub: Arc<Hub>,
    members: Arc<StdMutex<HashMap<SessionId, Identity>>>,
    timers: RoomTimers,
    receiver: mpsc::Receiver<RoomCommand>,
    /// identity -> instant of most recent disconnect, for the reconnect
    /// system-message suppression window (T_reconnect).
    last_disconnect: HashMap<Identity, Instant>,
    /// Deferred leave timers: identity -> the generation counter at the time
    /// the leave was scheduled, so a reconnect can cancel it by bumping the
    /// generation instead of threading a `JoinHandle` through.
    leave_generation: HashMap<Identity, u64>,
    pending_leaves: Vec<(Identity, u64, Instant)>,
    idle_since: Option<Instant>,
}

pub fn spawn_room(
    code: RoomCode,
    name: String,
    kind: RoomKind,
    privacy: RoomPrivacy,
    chat_limit: usize,
    timers: RoomTimers,
    hub: Arc<Hub>,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(256);
    let members = Arc::new(StdMutex::new(HashMap::new()));
    let room = Room::new(code.clone(), name, kind, privacy, chat_limit);
    let actor = RoomActor {
        room,
        hub,
        members: members.clone(),
        timers,
        receiver: rx,
        last_disconnect: HashMap::new(),
        leave_generation: HashMap::new(),
        pending_leaves: Vec::new(),
        idle_since: None,
    };
    tokio::spawn(actor.run());
    RoomHandle {
        code,
        sender: tx,
        members,
    }
}

impl RoomActor {
    async fn run(mut self) {
        let mut grace_ticker = interval(Duration::from_millis(250));
        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    match cmd {
                        Some(cmd) => self.handle(cmd).await,
                        None => break,
                    }
                }
                _ = grace_ticker.tick() => {
                    self.sweep_grace_windows();
                }
            }
        }
        log::debug!("room actor {} shut down", self.room.code);
    }

    async fn handle(&mut self, cmd: RoomCommand) {
        self.room.touch();
        match cmd {
            RoomCommand::Join { identity, name, avatar, session_id, reply } => {
                let outcome = self.handle_join(identity, name, avatar, session_id);
                let _ = reply.send(outcome);
            }
            RoomCommand::Leave { session_id } => self.handle_leave(session_id),
            RoomCommand::SendMessage { identity, content, reply_to } => {
                self.handle_send_message(identity, content, reply_to)
            }
            RoomCommand::EditMessage { identity, id, new_content } => {
                if let Err(err) = self.handle_edit_message(&identity, &id, new_content) {
                    self.notify_error(&identity, "edit_message", err);
                }
            }
            RoomCommand::DeleteMessage { identity, id } => {
                if let Err(err) = self.handle_delete_message(&identity, &id) {
                    self.notify_error(&identity, "delete_message", err);
                }
            }
            RoomCommand::AddReaction { identity, id, emoji } => {
                if let Err(err) = self.handle_add_reaction(&identity, &id, &emoji) {
                    self.notify_error(&identity, "add_message_reaction", err);
                }
            }
            RoomCommand::SendReaction { identity, emoji } => self.handle_send_reaction(identity, emoji),
            RoomCommand::Typing { identity, is_typing } => self.handle_typing(identity, is_typing),
            RoomCommand::UpdatePlayback { identity, action, is_playing, current_time, media } => {
                if let Err(err) = self.handle_update_playback(&identity, action, is_playing, current_time, media) {
                    self.notify_error(&identity, "update_playback", err);
                }
            }
            RoomCommand::SyncRequest { reply } => {
                let _ = reply.send(Ok(self.effective_sync_state()));
            }
            RoomCommand::ToggleLock { identity } => {
                if let Err(err) = self.handle_toggle_lock(&identity) {
                    self.notify_error(&identity, "toggle_lock", err);
                }
            }
            RoomCommand::TransferHost { identity, target } => {
                if let Err(err) = self.handle_transfer_host(&identity, &target) {
                    self.notify_error(&identity, "transfer_host", err);
                }
            }
            RoomCommand::KickUser { identity, target } => {
                if let Err(err) = self.handle_kick(&identity, &target) {
                    self.notify_error(&identity, "kick_user", err);
                }
            }
            RoomCommand::ScreenShareStart { identity } => self.handle_screen_share_start(identity),
            RoomCommand::ScreenShareStop { identity } => self.handle_screen_share_stop(identity),
            RoomCommand::ScreenShareReady { identity, session_id } => {
                self.handle_screen_share_ready(identity, session_id)
            }
            RoomCommand::ScreenShareOffer { from_session, to, offer } => {
                self.relay_screen_share("screen_share_offer", from_session, to, offer)
            }
            RoomCommand::ScreenShareAnswer { from_session, to, answer } => {
                self.relay_screen_share("screen_share_answer", from_session, to, answer)
            }
            RoomCommand::ScreenShareIce { from_session, to, candidate } => {
                self.relay_screen_share("screen_share_ice", from_session, to, candidate)
            }
            RoomCommand::VoiceJoined { identity } => {
                self.room.voice_members.insert(identity);
            }
            RoomCommand::VoiceLeft { identity } => {
                self.room.voice_members.remove(&identity);
            }
            RoomCommand::QueryIdle { reply } => {
                let empty = self.room.is_empty_of_participants();
                if empty {
                    self.idle_since.get_or_insert(Instant::now());
                } else {
                    self.idle_since = None;
                }
                let idle_for = self.idle_since.map(|t| t.elapsed()).unwrap_or(Duration::ZERO);
                let _ = reply.send(IdleStatus { empty_of_participants: empty, idle_for });
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn notify_error(&self, identity: &str, source: &str, err: RoomError) {
        if let Some(session_id) = self.room.participants.get(identity).map(|p| p.session_id) {
            self.hub.emit(
                session_id,
                OutboundFrame::broadcast("error", serde_json::json!({ "source": source, "error": err.code() })),
            );
        }
    }

    // ---- participants & host ------------------------------------------

    fn handle_join(
        &mut self,
        identity: Identity,
        name: String,
        avatar: String,
        session_id: SessionId,
    ) -> RoomResult<JoinOutcome> {
        let already_present = self.room.participants.contains_key(&identity);
        if self.room.locked && !already_present {
            return Err(RoomError::Locked);
        }

        // Cancel any pending leave for this identity by bumping its
        // generation; `sweep_grace_windows` checks the generation before
        // acting so an in-flight deferred leave becomes a no-op.
        *self.leave_generation.entry(identity.clone()).or_insert(0) += 1;

        let is_reconnect = already_present
            || self
                .last_disconnect
                .get(&identity)
                .map(|t| t.elapsed() < self.timers.reconnect_grace)
                .unwrap_or(false);

        let is_host = self.room.participants.is_empty() && self.room.host_identity.is_empty();
        let joined_at = self
            .room
            .participants
            .get(&identity)
            .and_then(|p| p.joined_at)
            .or(Some(Instant::now()));

        if let Some(previous) = self.room.participants.get(&identity) {
            if previous.session_id != session_id {
                self.members.lock().unwrap().remove(&previous.session_id);
            }
        }

        self.room.participants.insert(
            identity.clone(),
            Participant {
                identity: identity.clone(),
                display_name: name.clone(),
                avatar,
                session_id,
                is_host: is_host || self.room.is_host(&identity),
                joined_at,
            },
        );
        if is_host {
            self.room.host_identity = identity.clone();
        }
        self.members.lock().unwrap().insert(session_id, identity.clone());

        if !is_reconnect {
            self.push_system_message(format!("{name} joined"));
        }
        self.broadcast_user_joined(&identity, &name, session_id);

        Ok(JoinOutcome {
            snapshot: self.snapshot(),
            is_reconnect,
        })
    }

    fn handle_leave(&mut self, session_id: SessionId) {
        let identity = match self.members.lock().unwrap().get(&session_id).cloned() {
            Some(identity) => identity,
            None => return,
        };
        // Only real leaves (matching session still current) start grace;
        // a reconnect under a new session id is a fresh Join, which bumps
        // the generation and makes this deferred check a no-op.
        let current_session = self.room.participants.get(&identity).map(|p| p.session_id);
        if current_session != Some(session_id) {
            return;
        }
        let generation = *self.leave_generation.entry(identity.clone()).or_insert(0);
        self.last_disconnect.insert(identity.clone(), Instant::now());
        // Grace window is enforced by `sweep_grace_windows` comparing the
        // generation recorded here against the latest one for the identity.
        self.pending_leaves.push((identity, generation, Instant::now()));
    }

    fn sweep_grace_windows(&mut self) {
        let grace = self.timers.leave_grace;
        let mut still_pending = Vec::new();
        let pending = std::mem::take(&mut self.pending_leaves);
        for (identity, generation, scheduled_at) in pending {
            let current_generation = self.leave_generation.get(&identity).copied().unwrap_or(0);
            if current_generation != generation {
                continue; // reconnected within the window; cancelled.
            }
            if scheduled_at.elapsed() < grace {
                still_pending.push((identity, generation, scheduled_at));
                continue;
            }
            self.finalize_leave(&identity);
        }
        self.pending_leaves = still_pending;
    }

    fn finalize_leave(&mut self, identity: &str) {
        let Some(participant) = self.room.participants.remove(identity) else {
            return;
        };
        self.members.lock().unwrap().remove(&participant.session_id);
        self.room.voice_members.remove(identity);
        self.push_system_message(format!("{} left", participant.display_name));
        self.broadcast_to_room("user_left", UserLeftEvent { identity: identity.to_string() }, None);

        if self.room.is_host(identity) {
            if let Some(new_host) = self.room.elect_new_host() {
                self.room.host_identity = new_host.clone();
                for p in self.room.participants.values_mut() {
                    p.is_host = p.identity == new_host;
                }
                self.broadcast_host_update();
            } else {
                self.room.host_identity.clear();
            }
        }
    }

    fn broadcast_host_update(&self) {
        let users: Vec<Participant> = self.room.participants.values().cloned().collect();
        self.broadcast_to_room(
            "host_update",
            HostUpdateEvent {
                new_host_identity: self.room.host_identity.clone(),
                users,
            },
            None,
        );
    }

    fn handle_transfer_host(&mut self, identity: &str, target: &str) -> RoomResult<()> {
        self.room.require_host(identity)?;
        if !self.room.participants.contains_key(target) {
            return Err(RoomError::NotFound);
        }
        self.room.host_identity = target.to_string();
        for p in self.room.participants.values_mut() {
            p.is_host = p.identity == target;
        }
        self.broadcast_host_update();
        Ok(())
    }

    fn handle_kick(&mut self, identity: &str, target: &str) -> RoomResult<()> {
        self.room.require_host(identity)?;
        let participant = self.room.participants.get(target).cloned().ok_or(RoomError::NotFound)?;
        self.hub.emit(participant.session_id, OutboundFrame::broadcast("kicked", serde_json::json!({})));
        self.room.participants.remove(target);
        self.room.voice_members.remove(target);
        self.members.lock().unwrap().remove(&participant.session_id);
        self.push_system_message(format!("{} was removed", participant.display_name));
        self.broadcast_to_room("user_left", UserLeftEvent { identity: target.to_string() }, None);
        Ok(())
    }

    fn handle_toggle_lock(&mut self, identity: &str) -> RoomResult<()> {
        self.room.require_host(identity)?;
        self.room.locked = !self.room.locked;
        self.broadcast_to_room("room_locked", RoomLockedEvent { is_locked: self.room.locked }, None);
        Ok(())
    }

    // ---- chat -----------------------------------------------------------

    fn handle_send_message(&mut self, identity: Identity, content: String, reply_to: Option<String>) {
        let Some(participant) = self.room.participants.get(&identity).cloned() else {
            return;
        };
        let message = Message {
            id: Uuid::new_v4().to_string(),
            sender_identity: identity,
            sender_name: participant.display_name,
            sender_avatar: participant.avatar,
            content,
            timestamp: chrono::Utc::now(),
            kind: MessageKind::User,
            reply_to,
            edited: false,
            reactions: HashMap::new(),
        };
        self.room.chat.push(message.clone());
        self.broadcast_to_room("new_message", message, None);
    }

    fn handle_edit_message(&mut self, identity: &str, id: &str, new_content: String) -> RoomResult<()> {
        let message = self.room.chat.get_mut(id).ok_or(RoomError::NotFound)?;
        if message.sender_identity != identity {
            return Err(RoomError::Forbidden);
        }
        message.content = new_content;
        message.edited = true;
        let message = message.clone();
        self.broadcast_to_room("message_updated", message, None);
        Ok(())
    }

    fn handle_delete_message(&mut self, identity: &str, id: &str) -> RoomResult<()> {
        let message = self.room.chat.get_mut(id).ok_or(RoomError::NotFound)?;
        if message.sender_identity != identity {
            return Err(RoomError::Forbidden);
        }
        self.room.chat.remove(id);
        self.broadcast_to_room("message_deleted", serde_json::json!({ "id": id }), None);
        Ok(())
    }

    fn handle_add_reaction(&mut self, identity: &str, id: &str, emoji: &str) -> RoomResult<()> {
        let identity_owned = identity.to_string();
        self.room.toggle_reaction(id, emoji, &identity_owned)?;
        let message = self.room.chat.get_mut(id).ok_or(RoomError::NotFound)?;
        self.broadcast_to_room(
            "message_reaction_update",
            MessageReactionUpdateEvent {
                id: id.to_string(),
                reactions: message.reactions.clone(),
            },
            None,
        );
        Ok(())
    }

    fn handle_send_reaction(&mut self, identity: Identity, emoji: String) {
        let Some(participant) = self.room.participants.get(&identity) else { return };
        self.broadcast_to_room(
            "reaction_received",
            ReactionReceivedEvent { emoji, identity, name: participant.display_name.clone() },
            None,
        );
    }

    fn handle_typing(&mut self, identity: Identity, is_typing: bool) {
        let Some(participant) = self.room.participants.get(&identity) else { return };
        let session_id = participant.session_id;
        self.broadcast_to_room(
            "user_typing",
            UserTypingEvent { identity, name: participant.display_name.clone(), is_typing },
            Some(session_id),
        );
    }

    fn push_system_message(&mut self, content: String) {
        let message = Message {
            id: Uuid::new_v4().to_string(),
            sender_identity: String::new(),
            sender_name: String::new(),
            sender_avatar: String::new(),
            content,
            timestamp: chrono::Utc::now(),
            kind: MessageKind::System,
            reply_to: None,
            edited: false,
            reactions: HashMap::new(),
        };
        self.room.chat.push(message.clone());
        self.broadcast_to_room("new_message", message, None);
    }

    // ---- playback ---------------------------------------------------------

    fn handle_update_playback(
        &mut self,
        identity: &str,
        action: PlaybackAction,
        is_playing: bool,
        current_time: f64,
        media: Option<MediaInput>,
    ) -> RoomResult<()> {
        self.room.require_host(identity)?;
        let now = Instant::now();
        let position = Duration::from_secs_f64(current_time.max(0.0));

        match action {
            PlaybackAction::MediaChange => {
                let media = media.ok_or(RoomError::BadRequest)?;
                self.room.media = Some(Media { id: Uuid::new_v4().to_string(), url: media.url, kind: media.kind });
                self.room.playback.reanchor(false, Duration::ZERO, now);
            }
            PlaybackAction::MediaClear => {
                self.room.media = None;
                self.room.playback.reanchor(false, Duration::ZERO, now);
            }
            PlaybackAction::Play | PlaybackAction::Pause | PlaybackAction::Seek => {
                self.room.playback.reanchor(is_playing, position, now);
            }
        }

        let effective = self.room.playback.effective_position(now).as_secs_f64();
        self.broadcast_to_room(
            "playback_sync",
            PlaybackSyncEvent {
                media: self.room.media.clone(),
                is_playing: self.room.playback.is_playing(),
                current_time: effective,
                server_time: now_as_server_time(),
                action,
            },
            None,
        );
        Ok(())
    }

    fn effective_sync_state(&self) -> SyncState {
        let now = Instant::now();
        SyncState {
            is_playing: self.room.playback.is_playing(),
            current_time: self.room.playback.effective_position(now).as_secs_f64(),
        }
    }

    // ---- screen-share relay ----------------------------------------------

    fn handle_screen_share_start(&mut self, identity: Identity) {
        let Some(participant) = self.room.participants.get(&identity) else { return };
        if !self.room.is_host(&identity) {
            self.notify_error(&identity, "screen_share_start", RoomError::Forbidden);
            return;
        }
        let exclude = participant.session_id;
        self.broadcast_to_room("screen_share_started", serde_json::json!({}), Some(exclude));
    }

    fn handle_screen_share_stop(&mut self, identity: Identity) {
        if !self.room.is_host(&identity) {
            self.notify_error(&identity, "screen_share_stop", RoomError::Forbidden);
            return;
        }
        self.broadcast_to_room("screen_share_stopped", serde_json::json!({}), None);
    }

    fn handle_screen_share_ready(&mut self, identity: Identity, session_id: SessionId) {
        let Some(host) = self.room.participants.get(&self.room.host_identity) else { return };
        self.hub.emit(
            host.session_id,
            OutboundFrame::broadcast(
                "screen_share_request_offer",
                serde_json::json!({ "memberSessionId": session_id, "identity": identity }),
            ),
        );
    }

    fn relay_screen_share(&self, event: &str, from_session: SessionId, to: SessionId, payload: Value) {
        if !self.members.lock().unwrap().contains_key(&to) {
            return; // unknown target dropped silently
        }
        let mut value = match payload {
            Value::Object(map) => map,
            _ => Default::default(),
        };
        value.insert("from".to_string(), serde_json::json!(from_session));
        self.hub.emit(to, OutboundFrame::broadcast(event, Value::Object(value)));
    }

    // ---- snapshot / broadcast helpers -------------------------------------

    fn broadcast_user_joined(&self, identity: &str, name: &str, session_id: SessionId) {
        self.broadcast_to_room(
            "user_joined",
            UserJoinedEvent { identity: identity.to_string(), name: name.to_string(), avatar: String::new(), session_id },
            Some(session_id),
        );
    }

    fn broadcast_to_room(&self, event: &str, payload: impl serde::Serialize, exclude: Option<SessionId>) {
        let value = serde_json::to_value(payload).unwrap_or(Value::Null);
        let targets = match exclude {
            Some(exclude) => self.room.session_ids_excluding(exclude),
            None => self.room.session_ids(),
        };
        for session_id in targets {
            self.hub.emit(session_id, OutboundFrame::broadcast(event, value.clone()));
        }
    }

    fn snapshot(&self) -> RoomSnapshot {
        let now = Instant::now();
        RoomSnapshot {
            room_code: self.room.code.clone(),
            room_name: self.room.name.clone(),
            kind: self.room.kind,
            host_identity: self.room.host_identity.clone(),
            locked: self.room.locked,
            users: self.room.participants.values().cloned().collect(),
            voice_users: self.room.voice_members.iter().cloned().collect(),
            chat: self.room.chat.iter().cloned().collect(),
            media: self.room.media.clone(),
            is_playing: self.room.playback.is_playing(),
            current_time: self.room.playback.effective_position(now).as_secs_f64(),
            server_time: now_as_server_time(),
        }
    }
}

fn now_as_server_time() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}

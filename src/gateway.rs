//! The Session Gateway: one warp WebSocket route, one task per connection.
//! Generalizes the teacher's plain `warp::ws()` upgrade (the transport half
//! of `main.rs`, stripped of its GraphQL subscription layer) into the
//! envelope-dispatch loop described by the wire protocol in `protocol.rs`.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;
use warp::ws::{Message, WebSocket};
use warp::Filter;

use crate::error::RoomError;
use crate::hub::Hub;
use crate::model::{Identity, RoomCode, SessionId};
use crate::protocol::*;
use crate::registry::RoomRegistry;
use crate::room_actor::RoomHandle;
use crate::sfu::SfuBridge;

pub fn routes(
    registry: Arc<RoomRegistry>,
    sfu: Arc<SfuBridge>,
    hub: Arc<Hub>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("ws").and(warp::ws()).map(move |ws: warp::ws::Ws| {
        let registry = registry.clone();
        let sfu = sfu.clone();
        let hub = hub.clone();
        ws.on_upgrade(move |socket| handle_connection(socket, registry, sfu, hub))
    })
}

struct Connection {
    session_id: SessionId,
    identity: Option<Identity>,
    room: Option<RoomHandle>,
    registry: Arc<RoomRegistry>,
    sfu: Arc<SfuBridge>,
    hub: Arc<Hub>,
    last_sync_request: Option<std::time::Instant>,
}

async fn handle_connection(socket: WebSocket, registry: Arc<RoomRegistry>, sfu: Arc<SfuBridge>, hub: Arc<Hub>) {
    let session_id = Uuid::new_v4();
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<OutboundFrame>();
    hub.register(session_id, out_tx);

    let forward = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(err) => {
                    log::error!("failed to encode outbound frame: {err}");
                    continue;
                }
            };
            if ws_tx.send(Message::text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut conn = Connection {
        session_id,
        identity: None,
        room: None,
        registry,
        sfu,
        hub: hub.clone(),
        last_sync_request: None,
    };

    while let Some(msg) = ws_rx.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(err) => {
                log::debug!("websocket read error for session {session_id}: {err}");
                break;
            }
        };
        if !msg.is_text() {
            continue;
        }
        let frame: InboundFrame = match serde_json::from_str(msg.to_str().unwrap_or_default()) {
            Ok(frame) => frame,
            Err(err) => {
                log::debug!("malformed frame from session {session_id}: {err}");
                continue;
            }
        };
        conn.dispatch(frame).await;
    }

    if let Some(room) = &conn.room {
        let identity = conn.identity.clone();
        room.leave(session_id).await;
        let closed = conn.sfu.disconnect_session(&room.code, session_id);
        let had_voice_producer = closed.iter().any(|(_, producer_type)| producer_type == "voice");
        for (producer_id, _) in &closed {
            conn.hub.broadcast(&room.members.lock().unwrap().keys().copied().collect::<Vec<_>>(), || {
                OutboundFrame::broadcast("producer_closed", serde_json::json!({ "producerId": producer_id.to_string() }))
            });
        }
        if had_voice_producer {
            if let Some(identity) = identity {
                let _ = room.dispatch(crate::room_actor::RoomCommand::VoiceLeft { identity }).await;
            }
        }
    }
    hub.unregister(session_id);
    forward.abort();
}

impl Connection {
    async fn dispatch(&mut self, frame: InboundFrame) {
        let event = frame.event.as_str();
        let payload = frame.payload;
        let ack_id = frame.ack_id;

        macro_rules! parse {
            ($ty:ty) => {
                match serde_json::from_value::<$ty>(payload) {
                    Ok(v) => v,
                    Err(err) => {
                        self.ack_err(ack_id, RoomError::BadRequest, &err.to_string());
                        return;
                    }
                }
            };
        }

        match event {
            "create_room" => {
                let req: CreateRoomRequest = parse!(CreateRoomRequest);
                self.handle_create_room(req, ack_id).await;
            }
            "join_room" => {
                let req: JoinRoomRequest = parse!(JoinRoomRequest);
                self.handle_join_room(req, ack_id).await;
            }
            "leave_room" => {
                if let Some(room) = self.room.take() {
                    room.leave(self.session_id).await;
                }
            }
            "send_message" => {
                let req: SendMessageRequest = parse!(SendMessageRequest);
                if let Some((identity, room)) = self.identity_and_room() {
                    let _ = room
                        .dispatch(crate::room_actor::RoomCommand::SendMessage { identity, content: req.content, reply_to: req.reply_to })
                        .await;
                }
            }
            "edit_message" => {
                let req: EditMessageRequest = parse!(EditMessageRequest);
                if let Some((identity, room)) = self.identity_and_room() {
                    let _ = room
                        .dispatch(crate::room_actor::RoomCommand::EditMessage { identity, id: req.id, new_content: req.new_content })
                        .await;
                }
            }
            "delete_message" => {
                let req: DeleteMessageRequest = parse!(DeleteMessageRequest);
                if let Some((identity, room)) = self.identity_and_room() {
                    let _ = room.dispatch(crate::room_actor::RoomCommand::DeleteMessage { identity, id: req.id }).await;
                }
            }
            "add_message_reaction" => {
                let req: AddMessageReactionRequest = parse!(AddMessageReactionRequest);
                if let Some((identity, room)) = self.identity_and_room() {
                    let _ = room
                        .dispatch(crate::room_actor::RoomCommand::AddReaction { identity, id: req.id, emoji: req.emoji })
                        .await;
                }
            }
            "send_reaction" => {
                let req: SendReactionRequest = parse!(SendReactionRequest);
                if let Some((identity, room)) = self.identity_and_room() {
                    let _ = room.dispatch(crate::room_actor::RoomCommand::SendReaction { identity, emoji: req.emoji }).await;
                }
            }
            "typing" => {
                let req: TypingRequest = parse!(TypingRequest);
                if let Some((identity, room)) = self.identity_and_room() {
                    let _ = room.dispatch(crate::room_actor::RoomCommand::Typing { identity, is_typing: req.is_typing }).await;
                }
            }
            "update_playback" => {
                let req: UpdatePlaybackRequest = parse!(UpdatePlaybackRequest);
                if let Some((identity, room)) = self.identity_and_room() {
                    let _ = room
                        .dispatch(crate::room_actor::RoomCommand::UpdatePlayback {
                            identity,
                            action: req.action,
                            is_playing: req.is_playing,
                            current_time: req.current_time,
                            media: req.media,
                        })
                        .await;
                }
            }
            "sync_request" => {
                self.handle_sync_request(ack_id).await;
            }
            "toggle_lock" => {
                if let Some((identity, room)) = self.identity_and_room() {
                    let _ = room.dispatch(crate::room_actor::RoomCommand::ToggleLock { identity }).await;
                }
            }
            "transfer_host" => {
                let req: TransferHostRequest = parse!(TransferHostRequest);
                if let Some((identity, room)) = self.identity_and_room() {
                    let _ = room.dispatch(crate::room_actor::RoomCommand::TransferHost { identity, target: req.target }).await;
                }
            }
            "kick_user" => {
                let req: KickUserRequest = parse!(KickUserRequest);
                if let Some((identity, room)) = self.identity_and_room() {
                    let _ = room.dispatch(crate::room_actor::RoomCommand::KickUser { identity, target: req.target }).await;
                }
            }
            "screen_share_start" => {
                if let Some((identity, room)) = self.identity_and_room() {
                    let _ = room.dispatch(crate::room_actor::RoomCommand::ScreenShareStart { identity }).await;
                }
            }
            "screen_share_stop" => {
                if let Some((identity, room)) = self.identity_and_room() {
                    let _ = room.dispatch(crate::room_actor::RoomCommand::ScreenShareStop { identity }).await;
                }
            }
            "screen_share_ready" => {
                let session_id = self.session_id;
                if let Some((identity, room)) = self.identity_and_room() {
                    let _ = room.dispatch(crate::room_actor::RoomCommand::ScreenShareReady { identity, session_id }).await;
                }
            }
            "screen_share_offer" => {
                let req: ScreenShareOfferRequest = parse!(ScreenShareOfferRequest);
                self.relay_screen_share(crate::room_actor::RoomCommand::ScreenShareOffer {
                    from_session: self.session_id,
                    to: req.to,
                    offer: req.offer,
                })
                .await;
            }
            "screen_share_answer" => {
                let req: ScreenShareAnswerRequest = parse!(ScreenShareAnswerRequest);
                self.relay_screen_share(crate::room_actor::RoomCommand::ScreenShareAnswer {
                    from_session: self.session_id,
                    to: req.to,
                    answer: req.answer,
                })
                .await;
            }
            "screen_share_ice" => {
                let req: ScreenShareIceRequest = parse!(ScreenShareIceRequest);
                self.relay_screen_share(crate::room_actor::RoomCommand::ScreenShareIce {
                    from_session: self.session_id,
                    to: req.to,
                    candidate: req.candidate,
                })
                .await;
            }
            "get_router_capabilities" => self.handle_router_capabilities(ack_id).await,
            "create_transport" => {
                let req: CreateTransportRequest = parse!(CreateTransportRequest);
                self.handle_create_transport(req, ack_id).await;
            }
            "connect_transport" => {
                let req: ConnectTransportRequest = parse!(ConnectTransportRequest);
                self.handle_connect_transport(req, ack_id).await;
            }
            "produce" => {
                let req: ProduceRequest = parse!(ProduceRequest);
                self.handle_produce(req, ack_id).await;
            }
            "consume" => {
                let req: ConsumeRequest = parse!(ConsumeRequest);
                self.handle_consume(req, ack_id).await;
            }
            "resume_consumer" => {
                let req: ResumeConsumerRequest = parse!(ResumeConsumerRequest);
                self.handle_resume_consumer(req, ack_id).await;
            }
            "get_producers" => {
                let req: GetProducersRequest = parse!(GetProducersRequest);
                self.handle_get_producers(req, ack_id).await;
            }
            _ => {
                log::debug!("unknown event {event} from session {}", self.session_id);
                if ack_id.is_some() {
                    self.ack_err(ack_id, RoomError::UnknownEvent, "");
                }
            }
        }
    }

    async fn handle_create_room(&mut self, req: CreateRoomRequest, ack_id: Option<String>) {
        let room = match self.registry.create_room(req.room_name, req.kind, req.privacy) {
            Ok(room) => room,
            Err(err) => return self.ack_err(ack_id, err, ""),
        };
        match room.join(req.identity.clone(), req.name, req.avatar, self.session_id).await {
            Ok(outcome) => {
                self.identity = Some(req.identity);
                let room_code = room.code.clone();
                self.room = Some(room);
                self.ack_ok(ack_id, CreateRoomReply { success: true, room_code, room: outcome.snapshot });
            }
            Err(err) => self.ack_err(ack_id, err, ""),
        }
    }

    async fn handle_join_room(&mut self, req: JoinRoomRequest, ack_id: Option<String>) {
        let room = match self.registry.get(&req.room_code) {
            Ok(room) => room,
            Err(err) => return self.ack_err(ack_id, err, ""),
        };
        match room.join(req.identity.clone(), req.name, req.avatar, self.session_id).await {
            Ok(outcome) => {
                self.identity = Some(req.identity);
                self.room = Some(room);
                self.ack_ok(ack_id, JoinRoomReply { success: true, room: outcome.snapshot });
            }
            Err(err) => self.ack_err(ack_id, err, ""),
        }
    }

    async fn handle_sync_request(&mut self, ack_id: Option<String>) {
        let Some(room) = &self.room else {
            return self.ack_err(ack_id, RoomError::NotFound, "");
        };
        let now = std::time::Instant::now();
        if let Some(last) = self.last_sync_request {
            if now.duration_since(last) < std::time::Duration::from_secs(1) {
                return self.ack_err(ack_id, RoomError::RateLimited, "");
            }
        }
        self.last_sync_request = Some(now);
        match room.sync_request().await {
            Ok(state) => self.ack_ok(ack_id, SyncReply { success: true, state }),
            Err(err) => self.ack_err(ack_id, err, ""),
        }
    }

    async fn relay_screen_share(&self, cmd: crate::room_actor::RoomCommand) {
        if let Some(room) = &self.room {
            let _ = room.dispatch(cmd).await;
        }
    }

    /// Returns the caller's identity plus a cloned handle to their current
    /// room, or `None` if they haven't joined one yet (fire-and-forget
    /// events from a not-yet-joined session are dropped silently).
    fn identity_and_room(&self) -> Option<(Identity, RoomHandle)> {
        Some((self.identity.clone()?, self.room.clone()?))
    }

    // ---- SFU RPCs -----------------------------------------------------

    fn current_room_code(&self) -> Option<RoomCode> {
        self.room.as_ref().map(|r| r.code.clone())
    }

    async fn handle_router_capabilities(&mut self, ack_id: Option<String>) {
        let Some(code) = self.current_room_code() else {
            return self.ack_err(ack_id, RoomError::NotFound, "");
        };
        match self.sfu.router_capabilities(&code).await {
            Ok(caps) => {
                self.ack_ok(ack_id, RouterCapabilitiesReply(caps));
                if let Ok(existing) = self.sfu.get_producers(&code, self.session_id, None).await {
                    self.hub.emit(self.session_id, OutboundFrame::broadcast("existing-producers", existing));
                }
            }
            Err(err) => self.ack_err(ack_id, RoomError::from(err), ""),
        }
    }

    async fn handle_create_transport(&mut self, req: CreateTransportRequest, ack_id: Option<String>) {
        let (Some(code), Some(identity)) = (self.current_room_code(), self.identity.clone()) else {
            return self.ack_err(ack_id, RoomError::NotFound, "");
        };
        match self.sfu.create_transport(&code, self.session_id, &identity, req.direction).await {
            Ok(params) => self.ack_ok(ack_id, params),
            Err(err) => self.ack_err(ack_id, RoomError::from(err), ""),
        }
    }

    async fn handle_connect_transport(&mut self, req: ConnectTransportRequest, ack_id: Option<String>) {
        let Some(code) = self.current_room_code() else {
            return self.ack_err(ack_id, RoomError::NotFound, "");
        };
        match self.sfu.connect_transport(&code, self.session_id, req.transport_id.0, req.dtls_parameters).await {
            Ok(()) => self.ack_ok(ack_id, SuccessReply::OK),
            Err(err) => self.ack_err(ack_id, RoomError::from(err), ""),
        }
    }

    async fn handle_produce(&mut self, req: ProduceRequest, ack_id: Option<String>) {
        let (Some(code), Some(identity)) = (self.current_room_code(), self.identity.clone()) else {
            return self.ack_err(ack_id, RoomError::NotFound, "");
        };
        match self
            .sfu
            .produce(&code, self.session_id, req.transport_id.0, req.kind, req.rtp_parameters, req.app_data)
            .await
        {
            Ok(reply) => {
                let producer_id = reply.id.0;
                if reply.producer_type == "voice" {
                    if let Some(room) = &self.room {
                        let _ = room.dispatch(crate::room_actor::RoomCommand::VoiceJoined { identity }).await;
                    }
                    self.broadcast_to_room_except_self("voice-new-producer", serde_json::json!({ "producerId": producer_id.to_string() }));
                } else {
                    self.broadcast_to_room_except_self(
                        "new_producer",
                        serde_json::json!({ "producerId": producer_id.to_string(), "type": reply.producer_type.clone() }),
                    );
                }
                self.ack_ok(ack_id, reply);
            }
            Err(err) => self.ack_err(ack_id, RoomError::from(err), ""),
        }
    }

    fn broadcast_to_room_except_self(&self, event: &str, payload: serde_json::Value) {
        let Some(room) = &self.room else { return };
        let targets: Vec<_> = room
            .members
            .lock()
            .unwrap()
            .keys()
            .copied()
            .filter(|&sid| sid != self.session_id)
            .collect();
        self.hub.broadcast(&targets, || OutboundFrame::broadcast(event, payload.clone()));
    }

    async fn handle_consume(&mut self, req: ConsumeRequest, ack_id: Option<String>) {
        let Some(code) = self.current_room_code() else {
            return self.ack_err(ack_id, RoomError::NotFound, "");
        };
        match self
            .sfu
            .consume(&code, self.session_id, req.transport_id.0, req.producer_id.0, req.rtp_capabilities)
            .await
        {
            Ok(reply) => self.ack_ok(ack_id, reply),
            Err(err) => self.ack_err(ack_id, err, ""),
        }
    }

    async fn handle_resume_consumer(&mut self, req: ResumeConsumerRequest, ack_id: Option<String>) {
        let Some(code) = self.current_room_code() else {
            return self.ack_err(ack_id, RoomError::NotFound, "");
        };
        match self.sfu.resume_consumer(&code, self.session_id, req.consumer_id.0).await {
            Ok(()) => self.ack_ok(ack_id, SuccessReply::OK),
            Err(err) => self.ack_err(ack_id, RoomError::from(err), ""),
        }
    }

    async fn handle_get_producers(&mut self, req: GetProducersRequest, ack_id: Option<String>) {
        let Some(code) = self.current_room_code() else {
            return self.ack_err(ack_id, RoomError::NotFound, "");
        };
        match self.sfu.get_producers(&code, self.session_id, req.producer_type.as_deref()).await {
            Ok(list) => self.ack_ok(ack_id, list),
            Err(err) => self.ack_err(ack_id, RoomError::from(err), ""),
        }
    }

    // ---- ack helpers ----------------------------------------------------

    fn ack_ok(&self, ack_id: Option<String>, payload: impl serde::Serialize) {
        if let Some(ack_id) = ack_id {
            self.hub.emit(self.session_id, OutboundFrame::ack_ok(ack_id, payload));
        }
    }

    fn ack_err(&self, ack_id: Option<String>, err: RoomError, detail: &str) {
        if let Some(ack_id) = ack_id {
            let payload = if detail.is_empty() {
                serde_json::json!({ "error": err.code() })
            } else {
                serde_json::json!({ "error": err.code(), "detail": detail })
            };
            self.hub.emit(self.session_id, OutboundFrame { event: "ack".to_string(), payload, ack_id: Some(ack_id) });
        }
    }
}

//! The session-event wire protocol (§6). Every inbound frame carries an
//! `event` tag and a `payload`; request-shaped events additionally carry an
//! `ackId` that the reply must echo. This generalizes the teacher's
//! `#[serde(tag = "action")]` `ClientMessage`/`ServerMessage` pair
//! (`messages.rs`) from one SFU-only action set to the full SyncRoom surface.

use std::collections::HashMap;

use mediasoup::consumer::ConsumerId;
use mediasoup::data_structures::{DtlsParameters, IceCandidate, IceParameters};
use mediasoup::producer::ProducerId;
use mediasoup::rtp_parameters::{MediaKind, RtpCapabilities, RtpCapabilitiesFinalized, RtpParameters};
use mediasoup::transport::TransportId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{Identity, Media, MessageId, Participant, ReactionTally, RoomCode, RoomKind, RoomPrivacy};

/// An inbound frame as it arrives off the wire, before payload dispatch.
#[derive(Debug, Deserialize)]
pub struct InboundFrame {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ackId", default)]
    pub ack_id: Option<String>,
}

/// An outbound frame: either a broadcast/emit (`ackId` absent) or an
/// acknowledgement reply (`ackId` present, `error` xor a success `payload`).
#[derive(Debug, Serialize)]
pub struct OutboundFrame {
    pub event: String,
    pub payload: Value,
    #[serde(rename = "ackId", skip_serializing_if = "Option::is_none")]
    pub ack_id: Option<String>,
}

impl OutboundFrame {
    pub fn broadcast(event: &str, payload: impl Serialize) -> Self {
        Self {
            event: event.to_string(),
            payload: serde_json::to_value(payload).unwrap_or(Value::Null),
            ack_id: None,
        }
    }

    pub fn ack_ok(ack_id: String, payload: impl Serialize) -> Self {
        Self {
            event: "ack".to_string(),
            payload: serde_json::to_value(payload).unwrap_or(Value::Null),
            ack_id: Some(ack_id),
        }
    }
}

// ---- request payloads -----------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub identity: Identity,
    pub name: String,
    pub avatar: String,
    pub room_name: String,
    pub kind: RoomKind,
    pub privacy: RoomPrivacy,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomRequest {
    pub room_code: RoomCode,
    pub identity: Identity,
    pub name: String,
    pub avatar: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(default)]
    pub reply_to: Option<MessageId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditMessageRequest {
    pub id: MessageId,
    pub new_content: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteMessageRequest {
    pub id: MessageId,
}

#[derive(Debug, Deserialize)]
pub struct AddMessageReactionRequest {
    pub id: MessageId,
    pub emoji: String,
}

#[derive(Debug, Deserialize)]
pub struct SendReactionRequest {
    pub emoji: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingRequest {
    pub is_typing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackAction {
    Play,
    Pause,
    Seek,
    MediaChange,
    MediaClear,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlaybackRequest {
    pub action: PlaybackAction,
    pub is_playing: bool,
    pub current_time: f64,
    #[serde(default)]
    pub media: Option<MediaInput>,
}

#[derive(Debug, Deserialize)]
pub struct MediaInput {
    pub url: String,
    pub kind: String,
}

#[derive(Debug, Deserialize)]
pub struct TransferHostRequest {
    pub target: Identity,
}

#[derive(Debug, Deserialize)]
pub struct KickUserRequest {
    pub target: Identity,
}

#[derive(Debug, Deserialize)]
pub struct ScreenShareReadyRequest {}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenShareOfferRequest {
    pub to: uuid::Uuid,
    pub offer: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenShareAnswerRequest {
    pub to: uuid::Uuid,
    pub answer: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenShareIceRequest {
    pub to: uuid::Uuid,
    pub candidate: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransportRequest {
    pub direction: TransportDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportDirection {
    Send,
    Recv,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectTransportRequest {
    pub transport_id: TransportIdWire,
    pub dtls_parameters: DtlsParameters,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProduceRequest {
    pub transport_id: TransportIdWire,
    pub kind: MediaKind,
    pub rtp_parameters: RtpParameters,
    #[serde(default)]
    pub app_data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeRequest {
    pub transport_id: TransportIdWire,
    pub producer_id: ProducerIdWire,
    pub rtp_capabilities: RtpCapabilities,
}

#[derive(Debug, Deserialize)]
pub struct ResumeConsumerRequest {
    pub consumer_id: ConsumerIdWire,
}

#[derive(Debug, Deserialize)]
pub struct GetProducersRequest {
    #[serde(default)]
    pub producer_type: Option<String>,
}

/// mediasoup IDs deserialize from plain strings on the wire; these newtypes
/// bridge that without forcing mediasoup's own (de)serialize impls to match
/// our camelCase wire convention everywhere.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(transparent)]
pub struct TransportIdWire(pub TransportId);
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ProducerIdWire(pub ProducerId);
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ConsumerIdWire(pub ConsumerId);

// ---- response / broadcast payloads ----------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_code: RoomCode,
    pub room_name: String,
    pub kind: RoomKind,
    pub host_identity: Identity,
    pub locked: bool,
    pub users: Vec<Participant>,
    pub voice_users: Vec<Identity>,
    pub chat: Vec<crate::model::Message>,
    pub media: Option<Media>,
    pub is_playing: bool,
    pub current_time: f64,
    pub server_time: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomReply {
    pub success: bool,
    pub room_code: RoomCode,
    pub room: RoomSnapshot,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomReply {
    pub success: bool,
    pub room: RoomSnapshot,
}

#[derive(Debug, Serialize)]
pub struct SyncState {
    #[serde(rename = "isPlaying")]
    pub is_playing: bool,
    #[serde(rename = "currentTime")]
    pub current_time: f64,
}

#[derive(Debug, Serialize)]
pub struct SyncReply {
    pub success: bool,
    pub state: SyncState,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSyncEvent {
    pub media: Option<Media>,
    pub is_playing: bool,
    pub current_time: f64,
    pub server_time: f64,
    pub action: PlaybackAction,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserJoinedEvent {
    pub identity: Identity,
    pub name: String,
    pub avatar: String,
    pub session_id: uuid::Uuid,
}

#[derive(Debug, Serialize)]
pub struct UserLeftEvent {
    pub identity: Identity,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostUpdateEvent {
    pub new_host_identity: Identity,
    pub users: Vec<Participant>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomLockedEvent {
    pub is_locked: bool,
}

#[derive(Debug, Serialize)]
pub struct ReactionReceivedEvent {
    pub emoji: String,
    pub identity: Identity,
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReactionUpdateEvent {
    pub id: MessageId,
    pub reactions: HashMap<String, ReactionTally>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTypingEvent {
    pub identity: Identity,
    pub name: String,
    pub is_typing: bool,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TransportParams {
    pub id: TransportIdWire,
    pub dtls_parameters: DtlsParameters,
    pub ice_candidates: Vec<IceCandidate>,
    pub ice_parameters: IceParameters,
    pub ice_servers: Vec<IceServer>,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RouterCapabilitiesReply(pub RtpCapabilitiesFinalized);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducedReply {
    pub id: ProducerIdWire,
    #[serde(skip)]
    pub producer_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumedReply {
    pub id: ConsumerIdWire,
    pub producer_id: ProducerIdWire,
    pub kind: MediaKind,
    pub rtp_parameters: RtpParameters,
    pub app_data: Value,
}

#[derive(Debug, Serialize, Clone)]
pub struct ProducerDescriptor {
    #[serde(rename = "producerId")]
    pub producer_id: ProducerIdWire,
    pub kind: MediaKind,
    #[serde(rename = "type")]
    pub producer_type: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessReply {
    pub success: bool,
}

impl SuccessReply {
    pub const OK: SuccessReply = SuccessReply { success: true };
}

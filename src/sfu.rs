//! The SFU bridge: a mediasoup `WorkerManager` fronted by a small pool of
//! workers, one `Router` per room (created lazily, cached), and per-session
//! transport/producer/consumer bookkeeping. Grounded on the teacher's
//! `relay_server.rs` (`RelayServer::new`/`get_room`, worker + router setup)
//! and `session.rs` (per-session `State` of transports/producers/consumers,
//! the `local_pool.spawn_pinned` dance mediasoup's `!Send` futures require).
//! Handles mic (`voice`) and webcam (`camera`) tracks; screen-share media is
//! relayed peer-to-peer via `room_actor`'s signaling table and never touches
//! a router.
//!
//! Unlike the teacher, which pins everything to one worker, rooms are
//! assigned round-robin across a configurable worker pool so load spreads
//! across cores.

use std::collections::HashMap;
use std::net::{IpAddr, UdpSocket};
use std::num::{NonZeroU32, NonZeroU8};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use anyhow::{anyhow, Context, Result};
use mediasoup::consumer::{Consumer, ConsumerId, ConsumerOptions};
use mediasoup::data_structures::{DtlsParameters, TransportListenIp};
use mediasoup::producer::{Producer, ProducerId, ProducerOptions};
use mediasoup::router::{Router, RouterOptions};
use mediasoup::rtp_parameters::{
    MediaKind, MimeTypeAudio, MimeTypeVideo, RtcpFeedback, RtpCapabilities, RtpCapabilitiesFinalized,
    RtpCodecCapability, RtpCodecParametersParameters, RtpParameters,
};
use mediasoup::transport::{Transport, TransportId};
use mediasoup::webrtc_transport::{
    TransportListenIps, WebRtcTransport, WebRtcTransportOptions, WebRtcTransportRemoteParameters,
};
use mediasoup::worker::{Worker, WorkerSettings};
use mediasoup::worker_manager::WorkerManager;
use serde_json::Value;

use crate::config::Config;
use crate::error::RoomError;
use crate::model::{RoomCode, SessionId};
use crate::protocol::{
    ConsumedReply, IceServer, ProducedReply, ProducerDescriptor, TransportDirection, TransportIdWire,
    TransportParams,
};

/// A produced track plus the `appData.type` tag it was created with, e.g.
/// `"voice"` for a mic track or `"camera"` for a webcam track. Distinct from
/// `Producer::kind()` (audio/video): `get_producers`'s `type` filter and the
/// voice-vs-camera broadcast choice on `produce` both key off this tag, not
/// the codec kind.
struct ProducerEntry {
    producer: Producer,
    app_data: Value,
    producer_type: String,
}

struct SessionMedia {
    transports: HashMap<TransportId, WebRtcTransport>,
    producers: HashMap<ProducerId, ProducerEntry>,
    consumers: HashMap<ConsumerId, Consumer>,
}

impl SessionMedia {
    fn new() -> Self {
        Self {
            transports: HashMap::new(),
            producers: HashMap::new(),
            consumers: HashMap::new(),
        }
    }
}

struct RoomMedia {
    router: Router,
    sessions: StdMutex<HashMap<SessionId, SessionMedia>>,
}

pub struct SfuBridge {
    #[allow(dead_code)]
    worker_manager: WorkerManager,
    workers: Vec<Worker>,
    next_worker: AtomicUsize,
    local_pool: tokio_local::LocalPoolHandle,
    listen_ip: TransportListenIp,
    ice_servers: Vec<IceServer>,
    rooms: StdMutex<HashMap<RoomCode, Arc<RoomMedia>>>,
}

impl SfuBridge {
    pub async fn new(config: &Config) -> Result<Arc<Self>> {
        let worker_manager = WorkerManager::new();
        let mut workers = Vec::with_capacity(config.worker_count.max(1));
        for _ in 0..config.worker_count.max(1) {
            let mut settings = WorkerSettings::default();
            settings.rtc_ports_range = config.rtc_min_port..=config.rtc_max_port;
            let worker = worker_manager
                .create_worker(settings)
                .await
                .context("failed to spawn mediasoup worker")?;

            let restart_delay_ms = config.worker_restart_delay_ms;
            worker
                .on_dead(move || {
                    log::error!("mediasoup worker died, exiting after {restart_delay_ms}ms for orchestration to restart");
                    std::thread::sleep(std::time::Duration::from_millis(restart_delay_ms));
                    std::process::exit(1);
                })
                .detach();

            workers.push(worker);
        }

        let announced_ip = resolve_announced_ip(config)?;
        let listen_ip = TransportListenIp {
            ip: "0.0.0.0".parse().unwrap(),
            announced_ip: Some(announced_ip),
        };

        Ok(Arc::new(Self {
            worker_manager,
            workers,
            next_worker: AtomicUsize::new(0),
            local_pool: tokio_local::new_local_pool(2),
            listen_ip,
            ice_servers: build_ice_servers(config),
            rooms: StdMutex::new(HashMap::new()),
        }))
    }

    fn next_worker(&self) -> Worker {
        let idx = self.next_worker.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        self.workers[idx].clone()
    }

    async fn room(&self, room_code: &str) -> Result<Arc<RoomMedia>> {
        if let Some(room) = self.rooms.lock().unwrap().get(room_code) {
            return Ok(room.clone());
        }
        let worker = self.next_worker();
        let router = worker
            .create_router(RouterOptions::new(media_codecs()))
            .await
            .map_err(|e| anyhow!("failed to create router: {e}"))?;
        let room = Arc::new(RoomMedia {
            router,
            sessions: StdMutex::new(HashMap::new()),
        });
        self.rooms.lock().unwrap().entry(room_code.to_string()).or_insert(room.clone());
        Ok(room)
    }

    pub async fn router_capabilities(&self, room_code: &str) -> Result<RtpCapabilitiesFinalized> {
        let room = self.room(room_code).await?;
        Ok(room.router.rtp_capabilities().clone())
    }

    pub async fn create_transport(
        &self,
        room_code: &str,
        session_id: SessionId,
        _identity: &str,
        _direction: TransportDirection,
    ) -> Result<TransportParams> {
        let room = self.room(room_code).await?;
        let mut options = WebRtcTransportOptions::new(TransportListenIps::new(self.listen_ip));
        options.enable_tcp = true;
        options.prefer_tcp = true;
        options.initial_available_outgoing_bitrate = 1_500_000;
        let transport = room
            .router
            .create_webrtc_transport(options)
            .await
            .map_err(|e| anyhow!("failed to create transport: {e}"))?;

        let params = TransportParams {
            id: TransportIdWire(transport.id()),
            dtls_parameters: transport.dtls_parameters(),
            ice_candidates: transport.ice_candidates().clone(),
            ice_parameters: transport.ice_parameters().clone(),
            ice_servers: self.ice_servers.clone(),
        };

        let mut sessions = room.sessions.lock().unwrap();
        let entry = sessions.entry(session_id).or_insert_with(SessionMedia::new);
        entry.transports.insert(transport.id(), transport);
        Ok(params)
    }

    pub async fn connect_transport(
        &self,
        room_code: &str,
        session_id: SessionId,
        transport_id: TransportId,
        dtls_parameters: DtlsParameters,
    ) -> Result<()> {
        let room = self.room(room_code).await?;
        let transport = self
            .get_transport(&room, session_id, transport_id)
            .ok_or_else(|| anyhow!("transport does not exist"))?;
        transport
            .connect(WebRtcTransportRemoteParameters { dtls_parameters })
            .await
            .map_err(|e| anyhow!("transport connect failed: {e}"))?;
        Ok(())
    }

    pub async fn produce(
        &self,
        room_code: &str,
        session_id: SessionId,
        transport_id: TransportId,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
        app_data: Value,
    ) -> Result<ProducedReply> {
        let room = self.room(room_code).await?;
        let transport = self
            .get_transport(&room, session_id, transport_id)
            .ok_or_else(|| anyhow!("transport does not exist"))?;

        let producer = self
            .local_pool
            .spawn_pinned(move || async move { transport.produce(ProducerOptions::new(kind, rtp_parameters)).await })
            .await
            .map_err(|_| anyhow!("producer task panicked"))?
            .map_err(|e| anyhow!("produce failed: {e}"))?;

        let id = producer.id();
        let producer_type = app_data
            .get("type")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| default_producer_type(kind).to_string());

        let mut sessions = room.sessions.lock().unwrap();
        if let Some(session) = sessions.get_mut(&session_id) {
            session.producers.insert(id, ProducerEntry { producer, app_data, producer_type: producer_type.clone() });
        }
        Ok(ProducedReply { id: crate::protocol::ProducerIdWire(id), producer_type })
    }

    pub async fn consume(
        &self,
        room_code: &str,
        session_id: SessionId,
        transport_id: TransportId,
        producer_id: ProducerId,
        rtp_capabilities: RtpCapabilities,
    ) -> crate::error::RoomResult<ConsumedReply> {
        let room = self.room(room_code).await.map_err(|e| RoomError::Internal(e.to_string()))?;
        let transport = self
            .get_transport(&room, session_id, transport_id)
            .ok_or(RoomError::NotFound)?;

        if !room.router.can_consume(&producer_id, &rtp_capabilities) {
            return Err(RoomError::CannotConsume);
        }

        let source_app_data = {
            let sessions = room.sessions.lock().unwrap();
            sessions
                .values()
                .find_map(|s| s.producers.get(&producer_id))
                .map(|entry| entry.app_data.clone())
                .unwrap_or(Value::Null)
        };

        let mut options = ConsumerOptions::new(producer_id, rtp_capabilities);
        options.paused = true;
        let consumer = self
            .local_pool
            .spawn_pinned(|| async move { transport.consume(options).await })
            .await
            .map_err(|_| RoomError::Internal("consumer task panicked".to_string()))?
            .map_err(|e| RoomError::Internal(format!("consume failed: {e}")))?;

        let reply = ConsumedReply {
            id: crate::protocol::ConsumerIdWire(consumer.id()),
            producer_id: crate::protocol::ProducerIdWire(consumer.producer_id()),
            kind: consumer.kind(),
            rtp_parameters: consumer.rtp_parameters().clone(),
            app_data: source_app_data,
        };

        let mut sessions = room.sessions.lock().unwrap();
        if let Some(session) = sessions.get_mut(&session_id) {
            session.consumers.insert(consumer.id(), consumer);
        }
        Ok(reply)
    }

    pub async fn resume_consumer(&self, room_code: &str, session_id: SessionId, consumer_id: ConsumerId) -> Result<()> {
        let room = self.room(room_code).await?;
        let consumer = {
            let sessions = room.sessions.lock().unwrap();
            sessions
                .get(&session_id)
                .and_then(|s| s.consumers.get(&consumer_id))
                .cloned()
        }
        .ok_or_else(|| anyhow!("consumer does not exist"))?;
        consumer.resume().await.map_err(|e| anyhow!("resume failed: {e}"))?;
        Ok(())
    }

    /// Lists producers visible to `exclude_session` in `room_code`. When
    /// `producer_type` is omitted, voice producers are excluded — voice
    /// discovery happens through `voice-new-producer`/`VoiceJoined`, not this
    /// RPC.
    pub async fn get_producers(
        &self,
        room_code: &str,
        exclude_session: SessionId,
        producer_type: Option<&str>,
    ) -> Result<Vec<ProducerDescriptor>> {
        let room = self.room(room_code).await?;
        let sessions = room.sessions.lock().unwrap();
        let mut out = Vec::new();
        for (&sid, session) in sessions.iter() {
            if sid == exclude_session {
                continue;
            }
            for entry in session.producers.values() {
                match producer_type {
                    Some(filter) => {
                        if filter != entry.producer_type {
                            continue;
                        }
                    }
                    None => {
                        if entry.producer_type == "voice" {
                            continue;
                        }
                    }
                }
                out.push(ProducerDescriptor {
                    producer_id: crate::protocol::ProducerIdWire(entry.producer.id()),
                    kind: entry.producer.kind(),
                    producer_type: entry.producer_type.clone(),
                });
            }
        }
        Ok(out)
    }

    /// Tears down all transports/producers/consumers for a session, e.g. on
    /// disconnect. Returns the id and `appData.type` tag of each producer
    /// that was closed, so callers can notify the remaining peers and, for
    /// `"voice"` producers, retire voice membership without waiting on the
    /// room's leave grace window.
    pub fn disconnect_session(&self, room_code: &str, session_id: SessionId) -> Vec<(ProducerId, String)> {
        let Some(room) = self.rooms.lock().unwrap().get(room_code).cloned() else {
            return Vec::new();
        };
        let mut sessions = room.sessions.lock().unwrap();
        let Some(session) = sessions.remove(&session_id) else {
            return Vec::new();
        };
        session.producers.into_iter().map(|(id, entry)| (id, entry.producer_type)).collect()
    }

    pub fn has_producers(&self, room_code: &str) -> bool {
        let Some(room) = self.rooms.lock().unwrap().get(room_code).cloned() else {
            return false;
        };
        let sessions = room.sessions.lock().unwrap();
        sessions.values().any(|s| !s.producers.is_empty())
    }

    pub fn destroy_room(&self, room_code: &str) {
        self.rooms.lock().unwrap().remove(room_code);
    }

    fn get_transport(&self, room: &RoomMedia, session_id: SessionId, transport_id: TransportId) -> Option<WebRtcTransport> {
        room.sessions
            .lock()
            .unwrap()
            .get(&session_id)?
            .transports
            .get(&transport_id)
            .cloned()
    }
}

fn default_producer_type(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Audio => "voice",
        MediaKind::Video => "camera",
    }
}

fn media_codecs() -> Vec<RtpCodecCapability> {
    vec![
        RtpCodecCapability::Audio {
            mime_type: MimeTypeAudio::Opus,
            preferred_payload_type: None,
            clock_rate: NonZeroU32::new(48000).unwrap(),
            channels: NonZeroU8::new(2).unwrap(),
            parameters: RtpCodecParametersParameters::from([("useinbandfec", 1u32.into())]),
            rtcp_feedback: vec![RtcpFeedback::TransportCc],
        },
        RtpCodecCapability::Video {
            mime_type: MimeTypeVideo::Vp8,
            preferred_payload_type: None,
            clock_rate: NonZeroU32::new(90000).unwrap(),
            parameters: RtpCodecParametersParameters::default(),
            rtcp_feedback: vec![
                RtcpFeedback::Nack,
                RtcpFeedback::NackPli,
                RtcpFeedback::CcmFir,
                RtcpFeedback::GoogRemb,
                RtcpFeedback::TransportCc,
            ],
        },
    ]
}

/// Resolves the IP announced in ICE candidates: explicit config override,
/// else the local interface a socket would use to reach the public internet,
/// else loopback. `--production` only raises this to a hard error instead of
/// silently falling back to loopback, since a deployed server with no
/// reachable announce IP can't actually establish media.
fn resolve_announced_ip(config: &Config) -> Result<IpAddr> {
    if let Some(explicit) = &config.rtc_announce_ip {
        return explicit.parse().context("invalid --rtc-announce-ip");
    }
    match local_outbound_ip() {
        Some(ip) => Ok(ip),
        None if config.production => {
            Err(anyhow!("no reachable network interface found and no --rtc-announce-ip given"))
        }
        None => Ok(IpAddr::V4(std::net::Ipv4Addr::LOCALHOST)),
    }
}

fn local_outbound_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}

fn build_ice_servers(config: &Config) -> Vec<IceServer> {
    let mut servers: Vec<IceServer> = config
        .stun_servers
        .iter()
        .map(|url| IceServer { urls: vec![url.clone()], username: None, credential: None })
        .collect();
    if let Some(turn) = &config.turn_server {
        servers.push(IceServer {
            urls: vec![turn.clone()],
            username: config.turn_username.clone(),
            credential: config.turn_credential.clone(),
        });
    }
    servers
}

//! Integration tests for the SFU voice bridge, in the teacher's style of
//! exercising a real mediasoup worker end to end (`tests/fixture/mod.rs`
//! supplies the RTP parameter fixtures the way the teacher's did).

mod fixture;

use mediasoup::rtp_parameters::{MediaKind, MimeTypeVideo, RtpCapabilities, RtpCodecCapability};
use uuid::Uuid;

use syncroom_server::error::RoomError;
use syncroom_server::protocol::TransportDirection;
use syncroom_server::sfu::SfuBridge;

#[tokio::test]
async fn produce_then_consume_round_trip() {
    let config = fixture::test_config();
    let sfu = SfuBridge::new(&config).await.expect("sfu bridge init");

    let room_code = "ROOM01";
    let producer_session = Uuid::new_v4();
    let consumer_session = Uuid::new_v4();

    let send_params = sfu
        .create_transport(room_code, producer_session, "alice", TransportDirection::Send)
        .await
        .expect("create send transport");
    sfu.connect_transport(room_code, producer_session, send_params.id.0, fixture::dtls_parameters())
        .await
        .expect("connect send transport");

    let produced = sfu
        .produce(
            room_code,
            producer_session,
            send_params.id.0,
            MediaKind::Audio,
            fixture::audio_producer_device_parameters(),
            serde_json::json!({ "type": "screen" }),
        )
        .await
        .expect("produce");

    let producers = sfu
        .get_producers(room_code, consumer_session, None)
        .await
        .expect("list producers");
    assert_eq!(producers.len(), 1);
    assert_eq!(producers[0].producer_id.0, produced.id.0);

    let recv_params = sfu
        .create_transport(room_code, consumer_session, "bob", TransportDirection::Recv)
        .await
        .expect("create recv transport");
    sfu.connect_transport(room_code, consumer_session, recv_params.id.0, fixture::dtls_parameters())
        .await
        .expect("connect recv transport");

    let consumed = sfu
        .consume(
            room_code,
            consumer_session,
            recv_params.id.0,
            produced.id.0,
            fixture::consumer_device_capabilities(),
        )
        .await
        .expect("consume");
    assert_eq!(consumed.producer_id.0, produced.id.0);

    sfu.resume_consumer(room_code, consumer_session, consumed.id.0)
        .await
        .expect("resume consumer");

    assert!(sfu.has_producers(room_code));
    let closed = sfu.disconnect_session(room_code, producer_session);
    assert_eq!(closed, vec![(produced.id.0, "screen".to_string())]);
    assert!(!sfu.has_producers(room_code));
}

#[tokio::test]
async fn get_producers_excludes_caller_and_filters_by_type() {
    let config = fixture::test_config();
    let sfu = SfuBridge::new(&config).await.expect("sfu bridge init");
    let room_code = "ROOM02";
    let session = Uuid::new_v4();

    let transport = sfu
        .create_transport(room_code, session, "alice", TransportDirection::Send)
        .await
        .expect("create transport");
    sfu.connect_transport(room_code, session, transport.id.0, fixture::dtls_parameters())
        .await
        .expect("connect transport");
    sfu.produce(
        room_code,
        session,
        transport.id.0,
        MediaKind::Audio,
        fixture::audio_producer_device_parameters(),
        serde_json::json!({ "type": "screen" }),
    )
    .await
    .expect("produce");

    let from_self = sfu.get_producers(room_code, session, None).await.expect("list");
    assert!(from_self.is_empty(), "caller's own producers must not be echoed back");

    let other = Uuid::new_v4();
    let camera_filtered = sfu.get_producers(room_code, other, Some("camera")).await.expect("list");
    assert!(camera_filtered.is_empty(), "type filter must exclude producers tagged with a different type");

    let screen_listed = sfu.get_producers(room_code, other, Some("screen")).await.expect("list");
    assert_eq!(screen_listed.len(), 1);
}

#[tokio::test]
async fn get_producers_excludes_voice_by_default() {
    let config = fixture::test_config();
    let sfu = SfuBridge::new(&config).await.expect("sfu bridge init");
    let room_code = "ROOM03";
    let voice_session = Uuid::new_v4();

    let transport = sfu
        .create_transport(room_code, voice_session, "alice", TransportDirection::Send)
        .await
        .expect("create transport");
    sfu.connect_transport(room_code, voice_session, transport.id.0, fixture::dtls_parameters())
        .await
        .expect("connect transport");
    // no appData.type supplied: an audio producer defaults to "voice".
    sfu.produce(
        room_code,
        voice_session,
        transport.id.0,
        MediaKind::Audio,
        fixture::audio_producer_device_parameters(),
        serde_json::Value::Null,
    )
    .await
    .expect("produce");

    let other = Uuid::new_v4();
    let untyped = sfu.get_producers(room_code, other, None).await.expect("list");
    assert!(untyped.is_empty(), "voice producers use the dedicated voice discovery path, not get_producers");

    let explicit = sfu.get_producers(room_code, other, Some("voice")).await.expect("list");
    assert_eq!(explicit.len(), 1);
}

#[tokio::test]
async fn consume_rejects_incompatible_capabilities() {
    let config = fixture::test_config();
    let sfu = SfuBridge::new(&config).await.expect("sfu bridge init");
    let room_code = "ROOM04";
    let producer_session = Uuid::new_v4();
    let consumer_session = Uuid::new_v4();

    let send_params = sfu
        .create_transport(room_code, producer_session, "alice", TransportDirection::Send)
        .await
        .expect("create send transport");
    sfu.connect_transport(room_code, producer_session, send_params.id.0, fixture::dtls_parameters())
        .await
        .expect("connect send transport");
    let produced = sfu
        .produce(
            room_code,
            producer_session,
            send_params.id.0,
            MediaKind::Audio,
            fixture::audio_producer_device_parameters(),
            serde_json::json!({ "type": "screen" }),
        )
        .await
        .expect("produce");

    let recv_params = sfu
        .create_transport(room_code, consumer_session, "bob", TransportDirection::Recv)
        .await
        .expect("create recv transport");
    sfu.connect_transport(room_code, consumer_session, recv_params.id.0, fixture::dtls_parameters())
        .await
        .expect("connect recv transport");

    // the producer is audio-only; a video-only recv capability set can't consume it.
    let video_only_capabilities = RtpCapabilities {
        codecs: vec![RtpCodecCapability::Video {
            mime_type: MimeTypeVideo::Vp8,
            preferred_payload_type: Some(96),
            clock_rate: std::num::NonZeroU32::new(90000).unwrap(),
            parameters: Default::default(),
            rtcp_feedback: vec![],
        }],
        header_extensions: vec![],
        fec_mechanisms: vec![],
    };

    let err = sfu
        .consume(room_code, consumer_session, recv_params.id.0, produced.id.0, video_only_capabilities)
        .await
        .expect_err("incompatible capabilities must be rejected");
    assert!(matches!(err, RoomError::CannotConsume));
}

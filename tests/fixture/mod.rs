use std::num::{NonZeroU32, NonZeroU8};

use mediasoup::data_structures::{DtlsFingerprint, DtlsParameters, DtlsRole};
use mediasoup::rtp_parameters::{
    MediaKind, MimeTypeAudio, RtcpFeedback, RtpCapabilities, RtpCodecCapability, RtpCodecParameters,
    RtpCodecParametersParameters, RtpEncodingParameters, RtpHeaderExtension, RtpHeaderExtensionDirection,
    RtpHeaderExtensionParameters, RtpHeaderExtensionUri, RtpParameters,
};
use mediasoup::sctp_parameters::SctpStreamParameters;

use syncroom_server::config::Config;

/// A `Config` with deterministic, test-friendly defaults: loopback announce
/// IP (no network probing), a single mediasoup worker, short grace windows.
pub fn test_config() -> Config {
    Config {
        listen_addr: "127.0.0.1:0".to_string(),
        rtc_announce_ip: Some("127.0.0.1".to_string()),
        production: false,
        stun_servers: vec![],
        turn_server: None,
        turn_username: None,
        turn_credential: None,
        worker_count: 1,
        rtc_min_port: 40000,
        rtc_max_port: 40999,
        chat_history_limit: 200,
        reconnect_grace_ms: 50,
        leave_grace_ms: 50,
        idle_timeout_ms: 60_000,
        worker_restart_delay_ms: 2_000,
    }
}

pub fn dtls_parameters() -> DtlsParameters {
    DtlsParameters {
        role: DtlsRole::Client,
        fingerprints: vec![DtlsFingerprint::Sha256 {
            value: [
                0x82, 0x5A, 0x68, 0x3D, 0x36, 0xC3, 0x0A, 0xDE, 0xAF, 0xE7, 0x32, 0x43, 0xD2, 0x88, 0x83, 0x57, 0xAC,
                0x2D, 0x65, 0xE5, 0x80, 0xC4, 0xB6, 0xFB, 0xAF, 0x1A, 0xA0, 0x21, 0x9F, 0x6D, 0x0C, 0xAD,
            ],
        }],
    }
}

pub fn sctp_stream_parameters() -> SctpStreamParameters {
    SctpStreamParameters::new_unordered_with_life_time(12345, 5000)
}

pub fn audio_producer_device_parameters() -> RtpParameters {
    RtpParameters {
        mid: Some("AUDIO".to_string()),
        codecs: vec![RtpCodecParameters::Audio {
            mime_type: MimeTypeAudio::Opus,
            payload_type: 111,
            clock_rate: NonZeroU32::new(48000).unwrap(),
            channels: NonZeroU8::new(2).unwrap(),
            parameters: RtpCodecParametersParameters::from([("useinbandfec", 1u32.into())]),
            rtcp_feedback: vec![RtcpFeedback::TransportCc],
        }],
        header_extensions: vec![RtpHeaderExtensionParameters {
            uri: RtpHeaderExtensionUri::Mid,
            id: 10,
            encrypt: false,
        }],
        encodings: vec![RtpEncodingParameters {
            ssrc: Some(11111111),
            ..RtpEncodingParameters::default()
        }],
        rtcp: Default::default(),
    }
}

pub fn consumer_device_capabilities() -> RtpCapabilities {
    RtpCapabilities {
        codecs: vec![RtpCodecCapability::Audio {
            mime_type: MimeTypeAudio::Opus,
            preferred_payload_type: Some(100),
            clock_rate: NonZeroU32::new(48000).unwrap(),
            channels: NonZeroU8::new(2).unwrap(),
            parameters: RtpCodecParametersParameters::default(),
            rtcp_feedback: vec![],
        }],
        header_extensions: vec![RtpHeaderExtension {
            kind: Some(MediaKind::Audio),
            uri: RtpHeaderExtensionUri::Mid,
            preferred_id: 1,
            preferred_encrypt: false,
            direction: RtpHeaderExtensionDirection::default(),
        }],
        fec_mechanisms: vec![],
    }
}

//! Process configuration. Generalizes the teacher's `cmdline.rs` (a
//! `clap::Clap`-derived `Run` subcommand) to the clap v4 derive API and the
//! full SyncRoom config surface, with every flag overridable by environment
//! variable via `#[arg(env = ...)]`.

use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "syncroom-server", version = crate::built_info::PKG_VERSION, about)]
pub struct Config {
    /// Address the WebSocket gateway listens on.
    #[arg(long, env = "SYNCROOM_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// Public IP announced in ICE candidates. If unset, resolved by
    /// `--production` probing or falls back to the first non-loopback
    /// local interface, then loopback.
    #[arg(long, env = "SYNCROOM_RTC_ANNOUNCE_IP")]
    pub rtc_announce_ip: Option<String>,

    /// Enables the public-IP probe step of the announced-IP cascade.
    #[arg(long, env = "SYNCROOM_PRODUCTION")]
    pub production: bool,

    #[arg(long = "stun-server", env = "SYNCROOM_STUN_SERVERS", value_delimiter = ',')]
    pub stun_servers: Vec<String>,

    #[arg(long, env = "SYNCROOM_TURN_SERVER")]
    pub turn_server: Option<String>,
    #[arg(long, env = "SYNCROOM_TURN_USERNAME")]
    pub turn_username: Option<String>,
    #[arg(long, env = "SYNCROOM_TURN_CREDENTIAL")]
    pub turn_credential: Option<String>,

    /// Number of mediasoup workers in the pool; rooms' routers are
    /// round-robin assigned across them.
    #[arg(long, env = "SYNCROOM_WORKER_COUNT", default_value_t = 2)]
    pub worker_count: usize,

    #[arg(long, env = "SYNCROOM_RTC_MIN_PORT", default_value_t = 40000)]
    pub rtc_min_port: u16,
    #[arg(long, env = "SYNCROOM_RTC_MAX_PORT", default_value_t = 49999)]
    pub rtc_max_port: u16,

    /// Maximum retained chat messages per room, FIFO-evicted beyond this.
    #[arg(long, env = "SYNCROOM_CHAT_HISTORY_LIMIT", default_value_t = 200)]
    pub chat_history_limit: usize,

    #[arg(long, env = "SYNCROOM_RECONNECT_GRACE_MS", default_value_t = 5_000)]
    pub reconnect_grace_ms: u64,
    #[arg(long, env = "SYNCROOM_LEAVE_GRACE_MS", default_value_t = 3_000)]
    pub leave_grace_ms: u64,
    #[arg(long, env = "SYNCROOM_IDLE_TIMEOUT_MS", default_value_t = 60_000)]
    pub idle_timeout_ms: u64,

    /// Delay before the process exits after a mediasoup worker dies, to let
    /// orchestration restart it.
    #[arg(long, env = "SYNCROOM_WORKER_RESTART_DELAY_MS", default_value_t = 2_000)]
    pub worker_restart_delay_ms: u64,
}

impl Config {
    pub fn room_timers(&self) -> RoomTimers {
        RoomTimers {
            reconnect_grace: Duration::from_millis(self.reconnect_grace_ms),
            leave_grace: Duration::from_millis(self.leave_grace_ms),
            idle_timeout: Duration::from_millis(self.idle_timeout_ms),
        }
    }
}

/// Per-room grace/idle timers, plucked out of [`Config`] so `RoomActor`
/// doesn't need the whole CLI surface.
#[derive(Debug, Clone, Copy)]
pub struct RoomTimers {
    pub reconnect_grace: Duration,
    pub leave_grace: Duration,
    pub idle_timeout: Duration,
}

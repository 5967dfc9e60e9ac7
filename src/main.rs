use std::sync::Arc;

use clap::Parser;
use warp::Filter;

use syncroom_server::config::Config;
use syncroom_server::gateway;
use syncroom_server::hub::Hub;
use syncroom_server::registry::RoomRegistry;
use syncroom_server::sfu::SfuBridge;

#[tokio::main]
async fn main() {
    env_logger::init();
    let config = Config::parse();

    log::info!(
        "syncroom-server {} ({})",
        syncroom_server::built_info::PKG_VERSION,
        syncroom_server::built_info::GIT_COMMIT_HASH.unwrap_or("unknown")
    );

    let sfu = SfuBridge::new(&config).await.expect("failed to initialize SFU bridge");
    let hub = Arc::new(Hub::new());
    let registry = RoomRegistry::new(hub.clone(), config.room_timers(), config.chat_history_limit);
    registry.clone().spawn_reaper(sfu.clone());

    let routes = gateway::routes(registry, sfu, hub).with(warp::log("syncroom_server"));

    let addr: std::net::SocketAddr = config.listen_addr.parse().expect("invalid --listen-addr");
    log::info!("listening on {addr}");
    warp::serve(routes).run(addr).await;
}

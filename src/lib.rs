pub mod config;
pub mod error;
pub mod gateway;
pub mod hub;
pub mod model;
pub mod protocol;
pub mod registry;
pub mod room_actor;
pub mod sfu;
pub mod timekeeper;

pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

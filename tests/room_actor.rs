//! Integration tests for the room actor's command loop, driven the way a
//! gateway connection would: through a `Hub` so broadcasts are observable,
//! without touching the SFU (that's covered by `tests/sfu_bridge.rs`).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use uuid::Uuid;

use syncroom_server::config::RoomTimers;
use syncroom_server::hub::Hub;
use syncroom_server::model::{RoomKind, RoomPrivacy};
use syncroom_server::room_actor::spawn_room;

fn short_timers() -> RoomTimers {
    RoomTimers {
        reconnect_grace: Duration::from_millis(30),
        leave_grace: Duration::from_millis(30),
        idle_timeout: Duration::from_secs(60),
    }
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<syncroom_server::protocol::OutboundFrame>, event: &str) -> serde_json::Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("hub channel closed");
        if frame.event == event {
            return frame.payload;
        }
    }
}

#[tokio::test]
async fn join_broadcasts_user_joined_to_other_members() {
    let hub = Arc::new(Hub::new());
    let room = spawn_room(
        "ROOM01".to_string(),
        "Movie Night".to_string(),
        RoomKind::Video,
        RoomPrivacy::Public,
        200,
        short_timers(),
        hub.clone(),
    );

    let alice_session = Uuid::new_v4();
    let (alice_tx, mut alice_rx) = mpsc::unbounded_channel();
    hub.register(alice_session, alice_tx);
    let outcome = room
        .join("alice".to_string(), "Alice".to_string(), String::new(), alice_session)
        .await
        .expect("alice joins");
    assert_eq!(outcome.snapshot.host_identity, "alice");
    assert!(!outcome.is_reconnect);

    let bob_session = Uuid::new_v4();
    let (bob_tx, mut bob_rx) = mpsc::unbounded_channel();
    hub.register(bob_session, bob_tx);
    room.join("bob".to_string(), "Bob".to_string(), String::new(), bob_session)
        .await
        .expect("bob joins");

    let payload = next_event(&mut alice_rx, "user_joined").await;
    assert_eq!(payload["identity"], "bob");

    // bob should only see the system chat message about their own join, never
    // a user_joined event about themselves.
    let bobs_frame = tokio::time::timeout(Duration::from_millis(200), bob_rx.recv()).await.expect("bob got a frame").unwrap();
    assert_eq!(bobs_frame.event, "new_message");
    assert!(tokio::time::timeout(Duration::from_millis(100), bob_rx.recv()).await.is_err(), "bob should not receive more frames yet");
}

#[tokio::test]
async fn host_leaving_transfers_host_to_earliest_remaining_joiner() {
    let hub = Arc::new(Hub::new());
    let room = spawn_room(
        "ROOM02".to_string(),
        "Room".to_string(),
        RoomKind::Video,
        RoomPrivacy::Public,
        200,
        short_timers(),
        hub.clone(),
    );

    let host_session = Uuid::new_v4();
    let (host_tx, _host_rx) = mpsc::unbounded_channel();
    hub.register(host_session, host_tx);
    room.join("host".to_string(), "Host".to_string(), String::new(), host_session).await.unwrap();

    let member_session = Uuid::new_v4();
    let (member_tx, mut member_rx) = mpsc::unbounded_channel();
    hub.register(member_session, member_tx);
    room.join("member".to_string(), "Member".to_string(), String::new(), member_session).await.unwrap();

    room.leave(host_session).await;
    // leave is deferred behind a grace window before the host_update fires.
    let payload = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let frame = member_rx.recv().await.unwrap();
            if frame.event == "host_update" {
                return frame.payload;
            }
        }
    })
    .await
    .expect("host_update within grace window");
    assert_eq!(payload["newHostIdentity"], "member");
}

#[tokio::test]
async fn reconnect_within_grace_window_cancels_pending_leave() {
    let hub = Arc::new(Hub::new());
    let room = spawn_room(
        "ROOM03".to_string(),
        "Room".to_string(),
        RoomKind::Video,
        RoomPrivacy::Public,
        200,
        short_timers(),
        hub.clone(),
    );

    let session_a = Uuid::new_v4();
    let (tx_a, mut rx_a) = mpsc::unbounded_channel();
    hub.register(session_a, tx_a);
    room.join("alice".to_string(), "Alice".to_string(), String::new(), session_a).await.unwrap();

    room.leave(session_a).await;
    // Reconnect under a fresh session id before the grace window elapses.
    let session_b = Uuid::new_v4();
    let (tx_b, _rx_b) = mpsc::unbounded_channel();
    hub.register(session_b, tx_b);
    let outcome = room
        .join("alice".to_string(), "Alice".to_string(), String::new(), session_b)
        .await
        .expect("reconnect");
    assert!(outcome.is_reconnect);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let snapshot = room.snapshot().await.expect("snapshot");
    assert_eq!(snapshot.users.len(), 1, "reconnect must not be finalized as a leave");
    drop(rx_a);
}

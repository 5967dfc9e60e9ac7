//! The room data model: the types a [`crate::room_actor::RoomActor`] owns and
//! mutates. Nothing here talks to a socket or to mediasoup directly — it is
//! kept pure and synchronous so it can be unit tested without an executor.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant, SystemTime};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RoomError, RoomResult};
use crate::timekeeper::PlaybackClock;

pub type RoomCode = String;
pub type Identity = String;
pub type SessionId = Uuid;

const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const ROOM_CODE_LEN: usize = 6;

pub fn generate_room_code() -> RoomCode {
    let mut rng = rand::thread_rng();
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    Video,
    Audio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomPrivacy {
    Public,
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub id: String,
    pub url: String,
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub identity: Identity,
    pub display_name: String,
    pub avatar: String,
    pub session_id: SessionId,
    pub is_host: bool,
    #[serde(skip)]
    pub joined_at: Option<Instant>,
}

pub type MessageId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    User,
    System,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReactionTally {
    pub count: usize,
    #[serde(skip)]
    pub user_set: HashSet<Identity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_identity: Identity,
    pub sender_name: String,
    pub sender_avatar: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub kind: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MessageId>,
    pub edited: bool,
    pub reactions: HashMap<String, ReactionTally>,
}

/// Chat history, bounded to [`Room::CHAT_HISTORY_LIMIT`] with FIFO eviction.
#[derive(Debug, Default)]
pub struct Chat {
    messages: VecDeque<Message>,
    limit: usize,
}

impl Chat {
    pub fn new(limit: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            limit,
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push_back(message);
        while self.messages.len() > self.limit {
            self.messages.pop_front();
        }
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Message> {
        let idx = self.messages.iter().position(|m| m.id == id)?;
        self.messages.remove(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// The full authoritative state of one room. Owned exclusively by its
/// [`crate::room_actor::RoomActor`] task; never shared behind a lock.
pub struct Room {
    pub code: RoomCode,
    pub name: String,
    pub kind: RoomKind,
    pub privacy: RoomPrivacy,
    pub host_identity: Identity,
    pub locked: bool,
    pub participants: HashMap<Identity, Participant>,
    pub voice_members: HashSet<Identity>,
    pub media: Option<Media>,
    pub playback: PlaybackClock,
    pub chat: Chat,
    pub created_at: SystemTime,
    pub last_activity: Instant,
}

impl Room {
    pub fn new(code: RoomCode, name: String, kind: RoomKind, privacy: RoomPrivacy, chat_limit: usize) -> Self {
        Self {
            code,
            name,
            kind,
            privacy,
            host_identity: String::new(),
            locked: false,
            participants: HashMap::new(),
            voice_members: HashSet::new(),
            media: None,
            playback: PlaybackClock::new(),
            chat: Chat::new(chat_limit),
            created_at: SystemTime::now(),
            last_activity: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn is_host(&self, identity: &str) -> bool {
        self.host_identity == identity
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        self.participants.values().map(|p| p.session_id).collect()
    }

    pub fn session_ids_excluding(&self, exclude: SessionId) -> Vec<SessionId> {
        self.participants
            .values()
            .filter(|p| p.session_id != exclude)
            .map(|p| p.session_id)
            .collect()
    }

    pub fn is_empty_of_participants(&self) -> bool {
        self.participants.is_empty()
    }

    /// Host election: the participant with the earliest join time. Invariant
    /// I-1 requires the result always be a member of `participants`.
    pub fn elect_new_host(&self) -> Option<Identity> {
        self.participants
            .values()
            .min_by_key(|p| p.joined_at)
            .map(|p| p.identity.clone())
    }

    pub fn require_host(&self, identity: &str) -> RoomResult<()> {
        if self.is_host(identity) {
            Ok(())
        } else {
            Err(RoomError::Forbidden)
        }
    }

    pub fn toggle_reaction(&mut self, message_id: &str, emoji: &str, identity: &Identity) -> RoomResult<ReactionTally> {
        let message = self.chat.get_mut(message_id).ok_or(RoomError::NotFound)?;
        let tally = message.reactions.entry(emoji.to_string()).or_default();
        if !tally.user_set.insert(identity.clone()) {
            tally.user_set.remove(identity);
        }
        tally.count = tally.user_set.len();
        Ok(tally.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: &str, sender: &str) -> Message {
        Message {
            id: id.to_string(),
            sender_identity: sender.to_string(),
            sender_name: sender.to_string(),
            sender_avatar: String::new(),
            content: "hi".to_string(),
            timestamp: Utc::now(),
            kind: MessageKind::User,
            reply_to: None,
            edited: false,
            reactions: HashMap::new(),
        }
    }

    #[test]
    fn chat_evicts_fifo_beyond_limit() {
        let mut chat = Chat::new(3);
        for i in 0..5 {
            chat.push(msg(&i.to_string(), "u"));
        }
        assert_eq!(chat.len(), 3);
        let ids: Vec<_> = chat.iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, vec!["2", "3", "4"]);
    }

    #[test]
    fn reaction_toggle_is_idempotent_pairwise() {
        let mut room = Room::new("ABC123".into(), "r".into(), RoomKind::Video, RoomPrivacy::Public, 200);
        room.chat.push(msg("m1", "alice"));
        let first = room.toggle_reaction("m1", "\u{2764}\u{fe0f}", &"bob".to_string()).unwrap();
        assert_eq!(first.count, 1);
        let second = room.toggle_reaction("m1", "\u{2764}\u{fe0f}", &"bob".to_string()).unwrap();
        assert_eq!(second.count, 0);
    }

    #[test]
    fn reaction_on_unknown_message_is_not_found() {
        let mut room = Room::new("ABC123".into(), "r".into(), RoomKind::Video, RoomPrivacy::Public, 200);
        let err = room.toggle_reaction("nope", "x", &"bob".to_string()).unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn host_election_picks_earliest_joiner() {
        let mut room = Room::new("ABC123".into(), "r".into(), RoomKind::Video, RoomPrivacy::Public, 200);
        let now = Instant::now();
        room.participants.insert(
            "late".into(),
            Participant {
                identity: "late".into(),
                display_name: "Late".into(),
                avatar: String::new(),
                session_id: Uuid::new_v4(),
                is_host: false,
                joined_at: Some(now + Duration::from_secs(5)),
            },
        );
        room.participants.insert(
            "early".into(),
            Participant {
                identity: "early".into(),
                display_name: "Early".into(),
                avatar: String::new(),
                session_id: Uuid::new_v4(),
                is_host: false,
                joined_at: Some(now),
            },
        );
        assert_eq!(room.elect_new_host().unwrap(), "early");
    }

    #[test]
    fn room_code_has_expected_shape() {
        let code = generate_room_code();
        assert_eq!(code.len(), ROOM_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}

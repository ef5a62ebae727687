use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::schema::{conversations, message_media, messages};

// --- Conversation ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = conversations)]
pub struct Conversation {
    pub id: Uuid,
    pub user_a: Uuid,
    pub user_b: Uuid,
    pub last_message_id: Option<Uuid>,
    pub last_message_at: DateTime<Utc>,
    pub unread_count_a: i64,
    pub unread_count_b: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.user_a == user_id || self.user_b == user_id
    }

    /// The participant that is not `user_id`.
    pub fn other_participant(&self, user_id: Uuid) -> Uuid {
        if user_id == self.user_a {
            self.user_b
        } else {
            self.user_a
        }
    }

    /// The durable unread counter belonging to `user_id`.
    pub fn unread_for(&self, user_id: Uuid) -> i64 {
        if user_id == self.user_a {
            self.unread_count_a
        } else {
            self.unread_count_b
        }
    }
}

/// Participants are stored smallest-id-first so the unordered pair has exactly
/// one representation; the unique constraint on `(user_a, user_b)` then
/// guarantees at most one conversation per pair.
pub fn canonical_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = conversations)]
pub struct NewConversation {
    pub id: Uuid,
    pub user_a: Uuid,
    pub user_b: Uuid,
}

// --- Message ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = messages)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = messages)]
pub struct NewMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: Option<String>,
}

// --- MessageMedia ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = message_media)]
pub struct MessageMedia {
    pub id: Uuid,
    pub message_id: Uuid,
    pub position: i32,
    pub url: String,
    pub media_type: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = message_media)]
pub struct NewMessageMedia {
    pub id: Uuid,
    pub message_id: Uuid,
    pub position: i32,
    pub url: String,
    pub media_type: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_pair_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(canonical_pair(a, b), canonical_pair(b, a));

        let (first, second) = canonical_pair(a, b);
        assert!(first <= second);
    }

    fn conversation(user_a: Uuid, user_b: Uuid) -> Conversation {
        Conversation {
            id: Uuid::new_v4(),
            user_a,
            user_b,
            last_message_id: None,
            last_message_at: Utc::now(),
            unread_count_a: 3,
            unread_count_b: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn participant_helpers() {
        let (a, b) = canonical_pair(Uuid::new_v4(), Uuid::new_v4());
        let conv = conversation(a, b);

        assert!(conv.is_participant(a));
        assert!(conv.is_participant(b));
        assert!(!conv.is_participant(Uuid::new_v4()));

        assert_eq!(conv.other_participant(a), b);
        assert_eq!(conv.other_participant(b), a);

        assert_eq!(conv.unread_for(a), 3);
        assert_eq!(conv.unread_for(b), 0);
    }
}

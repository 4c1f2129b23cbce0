use std::{fmt, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

pub const SESSION_TTL_DAYS: i64 = 7;
pub const VERIFICATION_CODE_TTL_MINUTES: i64 = 10;
pub const USERNAME_COOLDOWN_DAYS: i64 = 21;
pub const MIN_PASSWORD_LEN: usize = 6;
pub const DEFAULT_EVENT_IMAGE: &str = "/vibrant-campus-event.png";

#[derive(Debug, Clone, FromRow, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub profile_picture: Option<String>,
    pub email_verified: bool,
    pub verification_code: Option<String>,
    pub verification_code_expiry: Option<DateTime<Utc>>,
    pub last_username_change: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One-time code waiting to be confirmed by the owner of the email address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingVerification {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl PendingVerification {
    pub fn issue(code: String, now: DateTime<Utc>) -> Self {
        Self {
            code,
            expires_at: now + Duration::minutes(VERIFICATION_CODE_TTL_MINUTES),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationError {
    AlreadyVerified,
    InvalidCode,
    Expired,
}

impl User {
    pub fn new_pending(
        email: String,
        username: String,
        password_hash: String,
        verification: PendingVerification,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            username,
            password_hash,
            profile_picture: None,
            email_verified: false,
            verification_code: Some(verification.code),
            verification_code_expiry: Some(verification.expires_at),
            last_username_change: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Checks a submitted code; the code is rejected after its expiry instant.
    pub fn check_verification_code(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<(), VerificationError> {
        if self.email_verified {
            return Err(VerificationError::AlreadyVerified);
        }
        if self.verification_code.as_deref() != Some(code) {
            return Err(VerificationError::InvalidCode);
        }
        match self.verification_code_expiry {
            Some(expiry) if now <= expiry => Ok(()),
            _ => Err(VerificationError::Expired),
        }
    }

    pub fn can_change_username(&self, now: DateTime<Utc>) -> bool {
        match self.last_username_change {
            Some(last) => now - last >= Duration::days(USERNAME_COOLDOWN_DAYS),
            None => true,
        }
    }
}

#[derive(Debug, Clone, FromRow, PartialEq, Eq)]
pub struct Session {
    pub token_hash: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(token_hash: String, user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            token_hash,
            user_id,
            expires_at: now + Duration::days(SESSION_TTL_DAYS),
            created_at: now,
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Academic,
    Social,
    Sports,
    Cultural,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Academic => "academic",
            Category::Social => "social",
            Category::Sports => "sports",
            Category::Cultural => "cultural",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "academic" => Ok(Category::Academic),
            "social" => Ok(Category::Social),
            "sports" => Ok(Category::Sports),
            "cultural" => Ok(Category::Cultural),
            "other" => Ok(Category::Other),
            other => Err(format!("unknown category '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub user_id: Uuid,
    pub emoji: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Like,
    Dislike,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionChange {
    Added,
    Removed,
    Replaced,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub date: DateTime<Utc>,
    pub category: Category,
    /// `None` for events created through the admin surface.
    pub created_by: Option<Uuid>,
    pub likes: Vec<Uuid>,
    pub dislikes: Vec<Uuid>,
    pub comments: Vec<Comment>,
    pub reactions: Vec<Reaction>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Flips the caller's vote. Casting a vote withdraws the opposite one, so a
    /// user id never sits in both `likes` and `dislikes`. Returns whether the
    /// vote is active afterwards.
    pub fn toggle_vote(&mut self, user_id: Uuid, vote: Vote) -> bool {
        let (chosen, opposite) = match vote {
            Vote::Like => (&mut self.likes, &mut self.dislikes),
            Vote::Dislike => (&mut self.dislikes, &mut self.likes),
        };
        if let Some(pos) = chosen.iter().position(|id| *id == user_id) {
            chosen.remove(pos);
            false
        } else {
            chosen.push(user_id);
            opposite.retain(|id| *id != user_id);
            true
        }
    }

    pub fn react(&mut self, user_id: Uuid, emoji: &str) -> ReactionChange {
        match self.reactions.iter().position(|r| r.user_id == user_id) {
            None => {
                self.reactions.push(Reaction {
                    user_id,
                    emoji: emoji.to_string(),
                });
                ReactionChange::Added
            }
            Some(pos) if self.reactions[pos].emoji == emoji => {
                self.reactions.remove(pos);
                ReactionChange::Removed
            }
            Some(pos) => {
                self.reactions[pos].emoji = emoji.to_string();
                ReactionChange::Replaced
            }
        }
    }

    /// Scrubs every trace of a user's engagement. Returns true when anything changed.
    pub fn remove_user_engagement(&mut self, user_id: Uuid) -> bool {
        let before = (
            self.likes.len(),
            self.dislikes.len(),
            self.comments.len(),
            self.reactions.len(),
        );
        self.likes.retain(|id| *id != user_id);
        self.dislikes.retain(|id| *id != user_id);
        self.comments.retain(|c| c.user_id != user_id);
        self.reactions.retain(|r| r.user_id != user_id);
        before
            != (
                self.likes.len(),
                self.dislikes.len(),
                self.comments.len(),
                self.reactions.len(),
            )
    }

    pub fn reaction_of(&self, user_id: Uuid) -> Option<&str> {
        self.reactions
            .iter()
            .find(|r| r.user_id == user_id)
            .map(|r| r.emoji.as_str())
    }

    pub fn involves(&self, user_id: Uuid) -> bool {
        self.likes.contains(&user_id)
            || self.dislikes.contains(&user_id)
            || self.comments.iter().any(|c| c.user_id == user_id)
    }
}

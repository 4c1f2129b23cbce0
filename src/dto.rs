use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::models::{Category, Comment, Event, PendingVerification, Reaction, User};

/// Keeps "field omitted" (`None`) apart from "field sent as null" (`Some(None)`).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SignupDto {
    pub email: Option<String>,
    pub password: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct VerifyDto {
    pub user_id: Option<Uuid>,
    pub code: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SigninDto {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileDto {
    pub username: Option<String>,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub profile_picture: Option<Option<String>>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DeleteAccountDto {
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AdminLoginDto {
    pub password: Option<String>,
}

/// Body of event create and update requests. Empty strings count as absent.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct EventInputDto {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub date: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ReactDto {
    pub emoji: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CommentDto {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ListEventsQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
}

/// Fields of a user that may change after creation. Only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub profile_picture: Option<Option<String>>,
    pub email_verified: Option<bool>,
    pub verification: Option<Option<PendingVerification>>,
    pub last_username_change: Option<DateTime<Utc>>,
}

impl UserPatch {
    pub fn apply(&self, user: &mut User, now: DateTime<Utc>) {
        if let Some(v) = &self.username {
            user.username = v.clone();
        }
        if let Some(v) = &self.password_hash {
            user.password_hash = v.clone();
        }
        if let Some(v) = &self.profile_picture {
            user.profile_picture = v.clone();
        }
        if let Some(v) = self.email_verified {
            user.email_verified = v;
        }
        if let Some(v) = &self.verification {
            user.verification_code = v.as_ref().map(|p| p.code.clone());
            user.verification_code_expiry = v.as_ref().map(|p| p.expires_at);
        }
        if let Some(v) = self.last_username_change {
            user.last_username_change = Some(v);
        }
        user.updated_at = now;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub category: Option<Category>,
}

impl EventPatch {
    pub fn apply(&self, event: &mut Event, now: DateTime<Utc>) {
        if let Some(v) = &self.title {
            event.title = v.clone();
        }
        if let Some(v) = &self.description {
            event.description = v.clone();
        }
        if let Some(v) = &self.image_url {
            event.image_url = v.clone();
        }
        if let Some(v) = self.date {
            event.date = v;
        }
        if let Some(v) = self.category {
            event.category = v;
        }
        event.updated_at = now;
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub profile_picture: Option<String>,
    pub last_username_change: Option<DateTime<Utc>>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            profile_picture: user.profile_picture.clone(),
            last_username_change: user.last_username_change,
        }
    }
}

/// Creator of an event as rendered to clients: a user id, or `"admin"`.
fn creator_label(created_by: Option<Uuid>) -> String {
    created_by.map_or_else(|| "admin".to_string(), |id| id.to_string())
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ViewerState {
    pub liked: bool,
    pub disliked: bool,
    pub reaction: Option<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub date: DateTime<Utc>,
    pub category: Category,
    pub created_by: String,
    pub likes_count: usize,
    pub dislikes_count: usize,
    pub comments_count: usize,
    pub reactions_count: usize,
    pub reaction_counts: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer: Option<ViewerState>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventSummary {
    pub fn new(event: &Event, viewer: Option<Uuid>) -> Self {
        let mut reaction_counts = BTreeMap::new();
        for reaction in &event.reactions {
            *reaction_counts.entry(reaction.emoji.clone()).or_insert(0) += 1;
        }
        Self {
            id: event.id,
            title: event.title.clone(),
            description: event.description.clone(),
            image_url: event.image_url.clone(),
            date: event.date,
            category: event.category,
            created_by: creator_label(event.created_by),
            likes_count: event.likes.len(),
            dislikes_count: event.dislikes.len(),
            comments_count: event.comments.len(),
            reactions_count: event.reactions.len(),
            reaction_counts,
            viewer: viewer.map(|user_id| ViewerState {
                liked: event.likes.contains(&user_id),
                disliked: event.dislikes.contains(&user_id),
                reaction: event.reaction_of(user_id).map(str::to_string),
            }),
            created_at: event.created_at,
            updated_at: event.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventDetail {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub date: DateTime<Utc>,
    pub category: Category,
    pub created_by: String,
    pub likes: Vec<Uuid>,
    pub dislikes: Vec<Uuid>,
    pub comments: Vec<Comment>,
    pub reactions: Vec<Reaction>,
    pub likes_count: usize,
    pub dislikes_count: usize,
    pub comments_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Event> for EventDetail {
    fn from(event: Event) -> Self {
        Self {
            id: event.id,
            likes_count: event.likes.len(),
            dislikes_count: event.dislikes.len(),
            comments_count: event.comments.len(),
            title: event.title,
            description: event.description,
            image_url: event.image_url,
            date: event.date,
            category: event.category,
            created_by: creator_label(event.created_by),
            likes: event.likes,
            dislikes: event.dislikes,
            comments: event.comments,
            reactions: event.reactions,
            created_at: event.created_at,
            updated_at: event.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdminEventDetail {
    #[serde(flatten)]
    pub event: EventDetail,
    pub liked_by: Vec<String>,
    pub disliked_by: Vec<String>,
}

#[derive(Debug, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AdminTotals {
    pub total_events: usize,
    pub total_likes: usize,
    pub total_dislikes: usize,
    pub total_comments: usize,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Like,
    Dislike,
    Comment,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub event_title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub likes_given: usize,
    pub dislikes_given: usize,
    pub comments_count: usize,
    pub events_interacted: usize,
    pub recent_activity: Vec<Activity>,
}

pub mod event;
pub mod memory;
pub mod session;
pub mod user;

use std::sync::Arc;

use derive_more::Display;
use futures::future::BoxFuture;
use log::{info, warn};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use crate::{
    config::Config,
    dto::{EventPatch, UserPatch},
    models::{Comment, Event, ReactionChange, Session, User, Vote},
};

pub use event::{EventQuery, EventSort};
pub use memory::MemoryStore;

pub type PGPool = sqlx::PgPool;
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Display)]
pub enum StoreError {
    /// A unique constraint rejected the write; carries the constraint name.
    #[display(fmt = "unique constraint violated: {}", _0)]
    Conflict(String),

    #[display(fmt = "database error: {}", _0)]
    Database(sqlx::Error),
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                let key = db_err.constraint().unwrap_or("unknown").to_string();
                return StoreError::Conflict(key);
            }
        }
        StoreError::Database(err)
    }
}

pub const USERS_EMAIL_KEY: &str = "users_email_key";
pub const USERS_USERNAME_KEY: &str = "users_username_key";

/// Persistence handle shared by every request. Engagement mutations are atomic
/// per event; everything else is last-write-wins.
pub trait Store: Send + Sync {
    fn insert_user<'a>(&'a self, user: &'a User) -> BoxFuture<'a, StoreResult<()>>;
    fn find_user(&self, id: Uuid) -> BoxFuture<'_, StoreResult<Option<User>>>;
    fn find_user_by_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, StoreResult<Option<User>>>;
    fn find_user_by_username<'a>(
        &'a self,
        username: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<User>>>;
    fn find_users<'a>(&'a self, ids: &'a [Uuid]) -> BoxFuture<'a, StoreResult<Vec<User>>>;
    /// Returns false when no user has this id.
    fn update_user<'a>(&'a self, id: Uuid, patch: &'a UserPatch) -> BoxFuture<'a, StoreResult<bool>>;
    /// Scrubs the user's engagement from all events, then deletes their sessions and the user.
    fn delete_user_cascade(&self, id: Uuid) -> BoxFuture<'_, StoreResult<()>>;

    fn insert_session<'a>(&'a self, session: &'a Session) -> BoxFuture<'a, StoreResult<()>>;
    fn find_session<'a>(&'a self, token_hash: &'a str) -> BoxFuture<'a, StoreResult<Option<Session>>>;
    fn delete_session<'a>(&'a self, token_hash: &'a str) -> BoxFuture<'a, StoreResult<()>>;

    fn insert_event<'a>(&'a self, event: &'a Event) -> BoxFuture<'a, StoreResult<()>>;
    fn find_event(&self, id: Uuid) -> BoxFuture<'_, StoreResult<Option<Event>>>;
    fn list_events<'a>(&'a self, query: &'a EventQuery) -> BoxFuture<'a, StoreResult<Vec<Event>>>;
    fn update_event<'a>(&'a self, id: Uuid, patch: &'a EventPatch) -> BoxFuture<'a, StoreResult<bool>>;
    fn delete_event(&self, id: Uuid) -> BoxFuture<'_, StoreResult<bool>>;
    /// `None` when the event does not exist, otherwise whether the vote is now active.
    fn toggle_vote(&self, id: Uuid, user_id: Uuid, vote: Vote)
        -> BoxFuture<'_, StoreResult<Option<bool>>>;
    fn react<'a>(
        &'a self,
        id: Uuid,
        user_id: Uuid,
        emoji: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<ReactionChange>>>;
    fn push_comment<'a>(&'a self, id: Uuid, comment: &'a Comment) -> BoxFuture<'a, StoreResult<bool>>;
    /// Events the user liked, disliked or commented on.
    fn events_engaged_by(&self, user_id: Uuid) -> BoxFuture<'_, StoreResult<Vec<Event>>>;

    fn close(&self) -> BoxFuture<'_, ()>;
}

pub struct PgStore {
    pool: PGPool,
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        email TEXT NOT NULL,
        username TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        profile_picture TEXT,
        email_verified BOOLEAN NOT NULL DEFAULT FALSE,
        verification_code TEXT,
        verification_code_expiry TIMESTAMPTZ,
        last_username_change TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        CONSTRAINT users_email_key UNIQUE (email),
        CONSTRAINT users_username_key UNIQUE (username)
    )",
    "CREATE TABLE IF NOT EXISTS sessions (
        token_hash TEXT PRIMARY KEY,
        user_id UUID NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS sessions_user_id_idx ON sessions (user_id)",
    "CREATE TABLE IF NOT EXISTS events (
        id UUID PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        image_url TEXT NOT NULL,
        date TIMESTAMPTZ NOT NULL,
        category TEXT NOT NULL,
        created_by UUID,
        likes UUID[] NOT NULL DEFAULT '{}',
        dislikes UUID[] NOT NULL DEFAULT '{}',
        comments JSONB NOT NULL DEFAULT '[]'::jsonb,
        reactions JSONB NOT NULL DEFAULT '[]'::jsonb,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS events_date_idx ON events (date)",
];

pub async fn init_db_pool(db_url: &str, max_connections: u32) -> Result<PGPool, sqlx::Error> {
    let pool: PGPool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(db_url)
        .await?;
    for statement in SCHEMA {
        sqlx::query(statement).execute(&pool).await?;
    }
    info!("Connected to postgresql, schema ready");
    Ok(pool)
}

/// Opens the store selected by the configuration.
pub async fn connect(config: &Config) -> StoreResult<Arc<dyn Store>> {
    match &config.database_url {
        Some(db_url) => {
            let pool = init_db_pool(db_url, config.db_max_connections).await?;
            Ok(Arc::new(PgStore { pool }))
        }
        None => {
            warn!("DATABASE_URL is not set, using the in-memory store; data is lost on shutdown");
            Ok(Arc::new(MemoryStore::default()))
        }
    }
}

impl Store for PgStore {
    fn insert_user<'a>(&'a self, u: &'a User) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move { user::create(u, &self.pool).await.map_err(StoreError::from) })
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'_, StoreResult<Option<User>>> {
        Box::pin(async move { user::get_by_id(id, &self.pool).await.map_err(StoreError::from) })
    }

    fn find_user_by_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, StoreResult<Option<User>>> {
        Box::pin(async move { user::get_by_email(email, &self.pool).await.map_err(StoreError::from) })
    }

    fn find_user_by_username<'a>(
        &'a self,
        username: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<User>>> {
        Box::pin(async move { user::get_by_username(username, &self.pool).await.map_err(StoreError::from) })
    }

    fn find_users<'a>(&'a self, ids: &'a [Uuid]) -> BoxFuture<'a, StoreResult<Vec<User>>> {
        Box::pin(async move { user::get_by_ids(ids, &self.pool).await.map_err(StoreError::from) })
    }

    fn update_user<'a>(&'a self, id: Uuid, patch: &'a UserPatch) -> BoxFuture<'a, StoreResult<bool>> {
        Box::pin(async move { user::set_fields(id, patch, &self.pool).await.map_err(StoreError::from) })
    }

    fn delete_user_cascade(&self, id: Uuid) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move { user::delete_cascade(id, &self.pool).await.map_err(StoreError::from) })
    }

    fn insert_session<'a>(&'a self, s: &'a Session) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move { session::create(s, &self.pool).await.map_err(StoreError::from) })
    }

    fn find_session<'a>(&'a self, token_hash: &'a str) -> BoxFuture<'a, StoreResult<Option<Session>>> {
        Box::pin(async move { session::get(token_hash, &self.pool).await.map_err(StoreError::from) })
    }

    fn delete_session<'a>(&'a self, token_hash: &'a str) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move { session::delete(token_hash, &self.pool).await.map_err(StoreError::from) })
    }

    fn insert_event<'a>(&'a self, e: &'a Event) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move { event::create(e, &self.pool).await.map_err(StoreError::from) })
    }

    fn find_event(&self, id: Uuid) -> BoxFuture<'_, StoreResult<Option<Event>>> {
        Box::pin(async move { event::get_by_id(id, &self.pool).await.map_err(StoreError::from) })
    }

    fn list_events<'a>(&'a self, query: &'a EventQuery) -> BoxFuture<'a, StoreResult<Vec<Event>>> {
        Box::pin(async move { event::get_all(query, &self.pool).await.map_err(StoreError::from) })
    }

    fn update_event<'a>(&'a self, id: Uuid, patch: &'a EventPatch) -> BoxFuture<'a, StoreResult<bool>> {
        Box::pin(async move { event::set_fields(id, patch, &self.pool).await.map_err(StoreError::from) })
    }

    fn delete_event(&self, id: Uuid) -> BoxFuture<'_, StoreResult<bool>> {
        Box::pin(async move { event::delete(id, &self.pool).await.map_err(StoreError::from) })
    }

    fn toggle_vote(
        &self,
        id: Uuid,
        user_id: Uuid,
        vote: Vote,
    ) -> BoxFuture<'_, StoreResult<Option<bool>>> {
        Box::pin(async move { event::toggle_vote(id, user_id, vote, &self.pool).await.map_err(StoreError::from) })
    }

    fn react<'a>(
        &'a self,
        id: Uuid,
        user_id: Uuid,
        emoji: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<ReactionChange>>> {
        Box::pin(async move { event::react(id, user_id, emoji, &self.pool).await.map_err(StoreError::from) })
    }

    fn push_comment<'a>(&'a self, id: Uuid, comment: &'a Comment) -> BoxFuture<'a, StoreResult<bool>> {
        Box::pin(async move { event::push_comment(id, comment, &self.pool).await.map_err(StoreError::from) })
    }

    fn events_engaged_by(&self, user_id: Uuid) -> BoxFuture<'_, StoreResult<Vec<Event>>> {
        Box::pin(async move { event::engaged_by(user_id, &self.pool).await.map_err(StoreError::from) })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.pool.close().await;
            info!("postgresql pool closed");
        })
    }
}

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use log::warn;
use sqlx::{prelude::FromRow, types::Json, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    db::PGPool,
    dto::EventPatch,
    models::{Category, Comment, Event, Reaction, ReactionChange, Vote},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventSort {
    /// Furthest date first.
    #[default]
    Latest,
    /// Nearest date first.
    Earliest,
    /// Most likes first, nearest date breaking ties.
    Popular,
    /// Most recently created first.
    Newest,
}

impl EventSort {
    /// Missing means `Latest`; unrecognised values fall back to `Newest`.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            None | Some("latest") => EventSort::Latest,
            Some("earliest") => EventSort::Earliest,
            Some("popular") => EventSort::Popular,
            Some(_) => EventSort::Newest,
        }
    }

    pub fn compare(&self, a: &Event, b: &Event) -> Ordering {
        match self {
            EventSort::Latest => b.date.cmp(&a.date),
            EventSort::Earliest => a.date.cmp(&b.date),
            EventSort::Popular => b
                .likes
                .len()
                .cmp(&a.likes.len())
                .then_with(|| a.date.cmp(&b.date)),
            EventSort::Newest => b.created_at.cmp(&a.created_at),
        }
    }

    fn order_by(&self) -> &'static str {
        match self {
            EventSort::Latest => " ORDER BY date DESC",
            EventSort::Earliest => " ORDER BY date ASC",
            EventSort::Popular => " ORDER BY cardinality(likes) DESC, date ASC",
            EventSort::Newest => " ORDER BY created_at DESC",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventQuery {
    pub category: Option<Category>,
    /// Case-insensitive substring of title or description.
    pub search: Option<String>,
    /// Only events dated at or after this instant.
    pub starting_from: Option<DateTime<Utc>>,
    pub sort: EventSort,
}

impl EventQuery {
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(from) = self.starting_from {
            if event.date < from {
                return false;
            }
        }
        if let Some(category) = self.category {
            if event.category != category {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            if !event.title.to_lowercase().contains(&needle)
                && !event.description.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }
}

/// ILIKE pattern matching `search` literally anywhere in the column.
pub fn like_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[derive(Debug, FromRow)]
struct EventRow {
    id: Uuid,
    title: String,
    description: String,
    image_url: String,
    date: DateTime<Utc>,
    category: String,
    created_by: Option<Uuid>,
    likes: Vec<Uuid>,
    dislikes: Vec<Uuid>,
    comments: Json<Vec<Comment>>,
    reactions: Json<Vec<Reaction>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        let category = row.category.parse().unwrap_or_else(|err| {
            warn!("event {}: {}, treating as 'other'", row.id, err);
            Category::Other
        });
        Event {
            id: row.id,
            title: row.title,
            description: row.description,
            image_url: row.image_url,
            date: row.date,
            category,
            created_by: row.created_by,
            likes: row.likes,
            dislikes: row.dislikes,
            comments: row.comments.0,
            reactions: row.reactions.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub async fn create(event: &Event, pool: &PGPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO events (id, title, description, image_url, date, category, created_by,
            likes, dislikes, comments, reactions, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
    )
    .bind(event.id)
    .bind(&event.title)
    .bind(&event.description)
    .bind(&event.image_url)
    .bind(event.date)
    .bind(event.category.as_str())
    .bind(event.created_by)
    .bind(&event.likes)
    .bind(&event.dislikes)
    .bind(Json(&event.comments))
    .bind(Json(&event.reactions))
    .bind(event.created_at)
    .bind(event.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_by_id(id: Uuid, pool: &PGPool) -> Result<Option<Event>, sqlx::Error> {
    let row = sqlx::query_as::<_, EventRow>("SELECT * FROM events WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Event::from))
}

pub async fn get_all(query: &EventQuery, pool: &PGPool) -> Result<Vec<Event>, sqlx::Error> {
    let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM events WHERE TRUE");
    if let Some(from) = query.starting_from {
        query_builder.push(" AND date >= ").push_bind(from);
    }
    if let Some(category) = query.category {
        query_builder.push(" AND category = ").push_bind(category.as_str());
    }
    if let Some(search) = &query.search {
        let pattern = like_pattern(search);
        query_builder
            .push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    query_builder.push(query.sort.order_by());

    let rows: Vec<EventRow> = query_builder.build_query_as().fetch_all(pool).await?;
    Ok(rows.into_iter().map(Event::from).collect())
}

pub async fn set_fields(id: Uuid, patch: &EventPatch, pool: &PGPool) -> Result<bool, sqlx::Error> {
    let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE events SET updated_at = ");
    query_builder.push_bind(Utc::now());
    if let Some(v) = &patch.title {
        query_builder.push(", title = ").push_bind(v.clone());
    }
    if let Some(v) = &patch.description {
        query_builder.push(", description = ").push_bind(v.clone());
    }
    if let Some(v) = &patch.image_url {
        query_builder.push(", image_url = ").push_bind(v.clone());
    }
    if let Some(v) = patch.date {
        query_builder.push(", date = ").push_bind(v);
    }
    if let Some(v) = patch.category {
        query_builder.push(", category = ").push_bind(v.as_str());
    }
    query_builder.push(" WHERE id = ").push_bind(id);

    let res = query_builder.build().execute(pool).await?;
    Ok(res.rows_affected() > 0)
}

pub async fn delete(id: Uuid, pool: &PGPool) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM events WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

// Engagement writes lock the event row, apply the change in Rust and write the
// touched columns back, all inside one transaction.

pub async fn toggle_vote(
    id: Uuid,
    user_id: Uuid,
    vote: Vote,
    pool: &PGPool,
) -> Result<Option<bool>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let row = sqlx::query_as::<_, EventRow>("SELECT * FROM events WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let mut event = Event::from(row);
    let active = event.toggle_vote(user_id, vote);
    sqlx::query("UPDATE events SET likes = $2, dislikes = $3, updated_at = $4 WHERE id = $1")
        .bind(id)
        .bind(&event.likes)
        .bind(&event.dislikes)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(Some(active))
}

pub async fn react(
    id: Uuid,
    user_id: Uuid,
    emoji: &str,
    pool: &PGPool,
) -> Result<Option<ReactionChange>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let row = sqlx::query_as::<_, EventRow>("SELECT * FROM events WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let mut event = Event::from(row);
    let change = event.react(user_id, emoji);
    sqlx::query("UPDATE events SET reactions = $2, updated_at = $3 WHERE id = $1")
        .bind(id)
        .bind(Json(&event.reactions))
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(Some(change))
}

pub async fn push_comment(id: Uuid, comment: &Comment, pool: &PGPool) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        "UPDATE events SET comments = comments || $2, updated_at = $3 WHERE id = $1",
    )
    .bind(id)
    .bind(Json(vec![comment]))
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn engaged_by(user_id: Uuid, pool: &PGPool) -> Result<Vec<Event>, sqlx::Error> {
    let marker = Json(serde_json::json!([{ "userId": user_id.to_string() }]));
    let rows = sqlx::query_as::<_, EventRow>(
        "SELECT * FROM events
        WHERE $1 = ANY(likes) OR $1 = ANY(dislikes) OR comments @> $2
        ORDER BY updated_at DESC",
    )
    .bind(user_id)
    .bind(&marker)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Event::from).collect())
}

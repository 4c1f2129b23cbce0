use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use log::info;
use uuid::Uuid;

use crate::{
    db::{EventQuery, EventSort},
    dto::{CommentDto, EventDetail, EventInputDto, EventPatch, EventSummary, ListEventsQuery, ReactDto},
    errors::ApiError,
    models::{Category, Comment, Event, ReactionChange, User, Vote, DEFAULT_EVENT_IMAGE},
    AppState,
};

fn event_not_found() -> ApiError {
    ApiError::not_found("Event not found")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Accepts RFC 3339, a zoneless `YYYY-MM-DDTHH:MM[:SS]` read as UTC, or a bare
/// date meaning midnight UTC.
pub fn parse_event_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn parse_category(value: &str) -> Result<Category, ApiError> {
    value
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid category"))
}

/// Validates a create request into a fresh event with no engagement.
/// `created_by` is `None` for admin-created events.
pub fn build_event(
    dto: EventInputDto,
    created_by: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<Event, ApiError> {
    let (Some(title), Some(description), Some(date), Some(category)) = (
        non_empty(dto.title),
        non_empty(dto.description),
        non_empty(dto.date),
        non_empty(dto.category),
    ) else {
        return Err(ApiError::missing_fields());
    };
    let date = parse_event_date(&date).ok_or_else(|| ApiError::bad_request("Invalid date"))?;
    if date < now {
        return Err(ApiError::bad_request("Cannot create events in the past"));
    }
    let category = parse_category(&category)?;

    Ok(Event {
        id: Uuid::new_v4(),
        title,
        description,
        image_url: non_empty(dto.image_url).unwrap_or_else(|| DEFAULT_EVENT_IMAGE.to_string()),
        date,
        category,
        created_by,
        likes: Vec::new(),
        dislikes: Vec::new(),
        comments: Vec::new(),
        reactions: Vec::new(),
        created_at: now,
        updated_at: now,
    })
}

/// Empty fields are left untouched.
pub fn build_patch(dto: EventInputDto, now: DateTime<Utc>) -> Result<EventPatch, ApiError> {
    let date = match non_empty(dto.date) {
        Some(raw) => {
            let date =
                parse_event_date(&raw).ok_or_else(|| ApiError::bad_request("Invalid date"))?;
            if date < now {
                return Err(ApiError::bad_request("Cannot set event date in the past"));
            }
            Some(date)
        }
        None => None,
    };
    let category = non_empty(dto.category)
        .map(|c| parse_category(&c))
        .transpose()?;

    Ok(EventPatch {
        title: non_empty(dto.title),
        description: non_empty(dto.description),
        image_url: non_empty(dto.image_url),
        date,
        category,
    })
}

pub fn build_query(params: ListEventsQuery, now: DateTime<Utc>) -> Result<EventQuery, ApiError> {
    let category = match non_empty(params.category).as_deref() {
        None | Some("all") => None,
        Some(other) => Some(parse_category(other)?),
    };
    Ok(EventQuery {
        category,
        search: non_empty(params.search),
        starting_from: Some(now),
        sort: EventSort::parse(params.sort.as_deref()),
    })
}

pub async fn list(
    state: &AppState,
    params: ListEventsQuery,
    viewer: Option<Uuid>,
) -> Result<Vec<EventSummary>, ApiError> {
    let query = build_query(params, Utc::now())?;
    let events = state.store.list_events(&query).await?;
    Ok(events
        .iter()
        .map(|event| EventSummary::new(event, viewer))
        .collect())
}

pub async fn get(state: &AppState, id: Uuid) -> Result<EventDetail, ApiError> {
    state
        .store
        .find_event(id)
        .await?
        .map(EventDetail::from)
        .ok_or_else(event_not_found)
}

pub async fn create(
    state: &AppState,
    dto: EventInputDto,
    created_by: Option<Uuid>,
) -> Result<Uuid, ApiError> {
    let event = build_event(dto, created_by, Utc::now())?;
    state.store.insert_event(&event).await?;
    info!("event {} created", event.id);
    Ok(event.id)
}

pub async fn update(state: &AppState, id: Uuid, dto: EventInputDto) -> Result<(), ApiError> {
    let patch = build_patch(dto, Utc::now())?;
    if !state.store.update_event(id, &patch).await? {
        return Err(event_not_found());
    }
    info!("event {} updated", id);
    Ok(())
}

pub async fn delete(state: &AppState, id: Uuid) -> Result<(), ApiError> {
    if !state.store.delete_event(id).await? {
        return Err(event_not_found());
    }
    info!("event {} deleted", id);
    Ok(())
}

/// Returns whether the caller's vote is active after the toggle.
pub async fn vote(state: &AppState, id: Uuid, user_id: Uuid, vote: Vote) -> Result<bool, ApiError> {
    state
        .store
        .toggle_vote(id, user_id, vote)
        .await?
        .ok_or_else(event_not_found)
}

pub async fn react(
    state: &AppState,
    id: Uuid,
    user_id: Uuid,
    dto: ReactDto,
) -> Result<ReactionChange, ApiError> {
    let Some(emoji) = non_empty(dto.emoji) else {
        return Err(ApiError::bad_request("Emoji is required"));
    };
    state
        .store
        .react(id, user_id, &emoji)
        .await?
        .ok_or_else(event_not_found)
}

pub async fn comment(
    state: &AppState,
    id: Uuid,
    author: &User,
    dto: CommentDto,
) -> Result<Comment, ApiError> {
    let Some(content) = non_empty(dto.content) else {
        return Err(ApiError::bad_request("Comment cannot be empty"));
    };
    let comment = Comment {
        id: Uuid::new_v4(),
        user_id: author.id,
        username: author.username.clone(),
        content,
        created_at: Utc::now(),
    };
    if !state.store.push_comment(id, &comment).await? {
        return Err(event_not_found());
    }
    Ok(comment)
}

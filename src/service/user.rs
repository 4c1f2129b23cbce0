use chrono::Utc;
use log::{info, warn};
use uuid::Uuid;

use crate::{
    db::{StoreError, USERS_EMAIL_KEY},
    dto::{
        Activity, ActivityKind, DeleteAccountDto, SigninDto, SignupDto, UpdateProfileDto,
        UserPatch, UserStats, VerifyDto,
    },
    errors::ApiError,
    models::{Event, PendingVerification, User, VerificationError, MIN_PASSWORD_LEN},
    service::{auth, crypto},
    AppState,
};

const RECENT_ACTIVITY_LIMIT: usize = 10;

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn conflict_message(err: StoreError) -> ApiError {
    match err {
        StoreError::Conflict(key) if key == USERS_EMAIL_KEY => {
            ApiError::bad_request("Email already registered")
        }
        StoreError::Conflict(_) => ApiError::bad_request("Username already taken"),
        other => other.into(),
    }
}

/// Registers an account awaiting email verification and mails the code.
/// A pending account with the same email is refreshed in place.
pub async fn signup(state: &AppState, dto: SignupDto) -> Result<Uuid, ApiError> {
    let store = state.store.as_ref();
    let password = dto.password.filter(|p| !p.is_empty());
    let (Some(email), Some(password), Some(username)) =
        (present(dto.email), password, present(dto.username))
    else {
        return Err(ApiError::missing_fields());
    };
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request("Password must be at least 6 characters"));
    }

    let existing = store.find_user_by_email(&email).await?;
    if existing.as_ref().is_some_and(|u| u.email_verified) {
        return Err(ApiError::bad_request("Email already registered"));
    }
    if let Some(holder) = store.find_user_by_username(&username).await? {
        if existing.as_ref().map(|u| u.id) != Some(holder.id) {
            return Err(ApiError::bad_request("Username already taken"));
        }
    }

    let password_hash = crypto::hash_password(password, state.config.bcrypt_cost).await?;
    let code = crypto::generate_verification_code();
    let now = Utc::now();
    let verification = PendingVerification::issue(code.clone(), now);

    let user_id = match existing {
        Some(pending) => {
            let patch = UserPatch {
                username: Some(username),
                password_hash: Some(password_hash),
                verification: Some(Some(verification)),
                ..Default::default()
            };
            store
                .update_user(pending.id, &patch)
                .await
                .map_err(conflict_message)?;
            info!("refreshed pending signup {}", pending.id);
            pending.id
        }
        None => {
            let user = User::new_pending(email.clone(), username, password_hash, verification, now);
            store.insert_user(&user).await.map_err(conflict_message)?;
            info!("created pending signup {}", user.id);
            user.id
        }
    };

    state
        .mailer
        .send_verification(&email, &code)
        .await
        .map_err(|err| {
            log::error!("[{} : {}] MAIL ERROR: {}", file!(), line!(), err);
            ApiError::internal()
        })?;
    Ok(user_id)
}

/// Confirms the code and opens a session. Returns the raw session token.
pub async fn verify(state: &AppState, dto: VerifyDto) -> Result<String, ApiError> {
    let store = state.store.as_ref();
    let (Some(user_id), Some(code)) = (dto.user_id, present(dto.code)) else {
        return Err(ApiError::missing_fields());
    };
    let user = store
        .find_user(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    user.check_verification_code(&code, Utc::now())
        .map_err(|err| match err {
            VerificationError::AlreadyVerified => ApiError::bad_request("Email already verified"),
            VerificationError::InvalidCode => ApiError::bad_request("Invalid verification code"),
            VerificationError::Expired => ApiError::bad_request("Verification code expired"),
        })?;

    let patch = UserPatch {
        email_verified: Some(true),
        verification: Some(None),
        ..Default::default()
    };
    store.update_user(user.id, &patch).await?;
    info!("email verified for user {}", user.id);
    auth::create_session(store, user.id).await
}

pub async fn signin(state: &AppState, dto: SigninDto) -> Result<(User, String), ApiError> {
    let store = state.store.as_ref();
    let (Some(email), Some(password)) = (present(dto.email), dto.password.filter(|p| !p.is_empty()))
    else {
        return Err(ApiError::missing_fields());
    };
    let invalid = || ApiError::Unauthorized("Invalid credentials".to_string());

    let Some(user) = store.find_user_by_email(&email).await? else {
        warn!("signin for unknown email");
        return Err(invalid());
    };
    if !user.email_verified {
        return Err(ApiError::Unauthorized("Please verify your email first".to_string()));
    }
    if !crypto::verify_password(password, user.password_hash.clone()).await? {
        warn!("wrong password for user {}", user.id);
        return Err(invalid());
    }

    let token = auth::create_session(store, user.id).await?;
    info!("user {} signed in", user.id);
    Ok((user, token))
}

pub async fn update_profile(
    state: &AppState,
    user: &User,
    dto: UpdateProfileDto,
) -> Result<(), ApiError> {
    let store = state.store.as_ref();
    let now = Utc::now();
    let mut patch = UserPatch::default();

    if let Some(username) = present(dto.username).filter(|u| *u != user.username) {
        if !user.can_change_username(now) {
            return Err(ApiError::bad_request(
                "You can only change your username once every 3 weeks",
            ));
        }
        if let Some(holder) = store.find_user_by_username(&username).await? {
            if holder.id != user.id {
                return Err(ApiError::bad_request("Username already taken"));
            }
        }
        patch.username = Some(username);
        patch.last_username_change = Some(now);
    }

    let current = dto.current_password.filter(|p| !p.is_empty());
    match (current, dto.new_password.filter(|p| !p.is_empty())) {
        (_, None) => {}
        (None, Some(_)) => return Err(ApiError::bad_request("Current password is required")),
        (Some(current), Some(new_password)) => {
            if !crypto::verify_password(current, user.password_hash.clone()).await? {
                return Err(ApiError::bad_request("Current password is incorrect"));
            }
            if new_password.chars().count() < MIN_PASSWORD_LEN {
                return Err(ApiError::bad_request(
                    "New password must be at least 6 characters",
                ));
            }
            patch.password_hash =
                Some(crypto::hash_password(new_password, state.config.bcrypt_cost).await?);
        }
    }

    if let Some(picture) = dto.profile_picture {
        patch.profile_picture = Some(picture);
    }

    store
        .update_user(user.id, &patch)
        .await
        .map_err(conflict_message)?;
    Ok(())
}

/// Removes the account after re-checking the password. The cascade clears the
/// user's engagement on every event and all of their sessions.
pub async fn delete_account(
    state: &AppState,
    user: &User,
    dto: DeleteAccountDto,
) -> Result<(), ApiError> {
    let Some(password) = dto.password.filter(|p| !p.is_empty()) else {
        return Err(ApiError::bad_request("Password is required"));
    };
    if !crypto::verify_password(password, user.password_hash.clone()).await? {
        return Err(ApiError::bad_request("Incorrect password"));
    }
    state.store.delete_user_cascade(user.id).await?;
    info!("deleted account {}", user.id);
    Ok(())
}

pub async fn stats(state: &AppState, user: &User) -> Result<UserStats, ApiError> {
    let events = state.store.events_engaged_by(user.id).await?;
    Ok(collect_stats(user.id, &events))
}

pub fn collect_stats(user_id: Uuid, events: &[Event]) -> UserStats {
    let mut stats = UserStats::default();
    for event in events {
        let mut involved = false;
        if event.likes.contains(&user_id) {
            stats.likes_given += 1;
            involved = true;
            stats.recent_activity.push(Activity {
                id: event.id,
                kind: ActivityKind::Like,
                event_title: event.title.clone(),
                created_at: event.updated_at,
            });
        }
        if event.dislikes.contains(&user_id) {
            stats.dislikes_given += 1;
            involved = true;
            stats.recent_activity.push(Activity {
                id: event.id,
                kind: ActivityKind::Dislike,
                event_title: event.title.clone(),
                created_at: event.updated_at,
            });
        }
        for comment in event.comments.iter().filter(|c| c.user_id == user_id) {
            stats.comments_count += 1;
            involved = true;
            stats.recent_activity.push(Activity {
                id: event.id,
                kind: ActivityKind::Comment,
                event_title: event.title.clone(),
                created_at: comment.created_at,
            });
        }
        if involved {
            stats.events_interacted += 1;
        }
    }
    stats
        .recent_activity
        .sort_by(|a, b| b.created_at.cmp(&a.created_at));
    stats.recent_activity.truncate(RECENT_ACTIVITY_LIMIT);
    stats
}

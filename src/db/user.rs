use chrono::Utc;
use sqlx::{types::Json, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{db::PGPool, dto::UserPatch, models::User};

pub async fn create(user: &User, pool: &PGPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO users (id, email, username, password_hash, profile_picture, email_verified,
            verification_code, verification_code_expiry, last_username_change, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(user.id)
    .bind(&user.email)
    .bind(&user.username)
    .bind(&user.password_hash)
    .bind(&user.profile_picture)
    .bind(user.email_verified)
    .bind(&user.verification_code)
    .bind(user.verification_code_expiry)
    .bind(user.last_username_change)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_by_id(id: Uuid, pool: &PGPool) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_by_email(email: &str, pool: &PGPool) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn get_by_username(username: &str, pool: &PGPool) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await
}

pub async fn get_by_ids(ids: &[Uuid], pool: &PGPool) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
}

pub async fn set_fields(id: Uuid, patch: &UserPatch, pool: &PGPool) -> Result<bool, sqlx::Error> {
    let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET updated_at = ");
    query_builder.push_bind(Utc::now());
    if let Some(v) = &patch.username {
        query_builder.push(", username = ").push_bind(v.clone());
    }
    if let Some(v) = &patch.password_hash {
        query_builder.push(", password_hash = ").push_bind(v.clone());
    }
    if let Some(v) = &patch.profile_picture {
        query_builder.push(", profile_picture = ").push_bind(v.clone());
    }
    if let Some(v) = patch.email_verified {
        query_builder.push(", email_verified = ").push_bind(v);
    }
    if let Some(v) = &patch.verification {
        query_builder
            .push(", verification_code = ")
            .push_bind(v.as_ref().map(|p| p.code.clone()))
            .push(", verification_code_expiry = ")
            .push_bind(v.as_ref().map(|p| p.expires_at));
    }
    if let Some(v) = patch.last_username_change {
        query_builder.push(", last_username_change = ").push_bind(v);
    }
    query_builder.push(" WHERE id = ").push_bind(id);

    let res = query_builder.build().execute(pool).await?;
    Ok(res.rows_affected() > 0)
}

/// Runs the whole account cascade in one transaction.
pub async fn delete_cascade(id: Uuid, pool: &PGPool) -> Result<(), sqlx::Error> {
    let id_text = id.to_string();
    let marker = Json(serde_json::json!([{ "userId": id_text }]));

    let mut tx = pool.begin().await?;
    sqlx::query(
        "UPDATE events SET
            likes = array_remove(likes, $1),
            dislikes = array_remove(dislikes, $1),
            comments = COALESCE(
                (SELECT jsonb_agg(c.value) FROM jsonb_array_elements(comments) AS c(value)
                 WHERE c.value->>'userId' <> $2),
                '[]'::jsonb),
            reactions = COALESCE(
                (SELECT jsonb_agg(r.value) FROM jsonb_array_elements(reactions) AS r(value)
                 WHERE r.value->>'userId' <> $2),
                '[]'::jsonb)
        WHERE $1 = ANY(likes) OR $1 = ANY(dislikes) OR comments @> $3 OR reactions @> $3",
    )
    .bind(id)
    .bind(&id_text)
    .bind(&marker)
    .execute(&mut *tx)
    .await?;
    sqlx::query("DELETE FROM sessions WHERE user_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await
}

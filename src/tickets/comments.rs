//! Ticket comment handlers. Listing needs only a live parent ticket;
//! posting requires edit rights on it; deleting is admin-only.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use diesel::prelude::*;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::profiles::load_profile;
use crate::shared::error::ApiError;
use crate::shared::models::{NewTicketComment, Profile, TicketComment};
use crate::shared::schema::{profiles, ticket_comments};
use crate::shared::state::AppState;
use crate::web::auth::AuthenticatedUser;

use super::handlers::find_ticket;
use super::policy;
use super::types::{CommentAuthor, CommentWithAuthor, CreateCommentRequest};

pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(ticket_id): Path<Uuid>,
) -> Result<Json<Vec<CommentWithAuthor>>, ApiError> {
    let pool = state.conn.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| ApiError::Database(e.to_string()))?;
        load_profile(&mut conn, user.user_id)?;
        find_ticket(&mut conn, ticket_id)?;

        let rows: Vec<TicketComment> = ticket_comments::table
            .filter(ticket_comments::ticket_id.eq(ticket_id))
            .order(ticket_comments::created_at.asc())
            .load(&mut conn)
            .map_err(|e| ApiError::Database(e.to_string()))?;

        let mut author_ids: Vec<Uuid> = rows.iter().map(|c| c.user_id).collect();
        author_ids.sort_unstable();
        author_ids.dedup();

        let authors: HashMap<Uuid, Profile> = profiles::table
            .filter(profiles::id.eq_any(&author_ids))
            .load::<Profile>(&mut conn)
            .map_err(|e| ApiError::Database(e.to_string()))?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let result: Vec<CommentWithAuthor> = rows
            .into_iter()
            .map(|comment| CommentWithAuthor {
                user: authors.get(&comment.user_id).map(CommentAuthor::from),
                comment,
            })
            .collect();

        Ok::<Vec<CommentWithAuthor>, ApiError>(result)
    })
    .await
    .map_err(|e: tokio::task::JoinError| ApiError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(ticket_id): Path<Uuid>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentWithAuthor>), ApiError> {
    let text = req.comment.trim().to_string();
    if text.is_empty() {
        return Err(ApiError::InvalidInput("comment text is required".to_string()));
    }

    let pool = state.conn.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| ApiError::Database(e.to_string()))?;
        let actor = load_profile(&mut conn, user.user_id)?;
        let ticket = find_ticket(&mut conn, ticket_id)?;
        policy::require_edit(&actor, &ticket)?;

        let row = NewTicketComment {
            id: Uuid::new_v4(),
            ticket_id: ticket.id,
            user_id: actor.id,
            comment: text,
            is_internal: req.is_internal.unwrap_or(false),
        };

        let comment: TicketComment = diesel::insert_into(ticket_comments::table)
            .values(&row)
            .get_result(&mut conn)
            .map_err(|e| ApiError::Database(e.to_string()))?;

        Ok::<CommentWithAuthor, ApiError>(CommentWithAuthor {
            user: Some(CommentAuthor::from(&actor)),
            comment,
        })
    })
    .await
    .map_err(|e: tokio::task::JoinError| ApiError::Internal(e.to_string()))??;

    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path((ticket_id, comment_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let pool = state.conn.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| ApiError::Database(e.to_string()))?;
        let actor = load_profile(&mut conn, user.user_id)?;
        policy::require_admin(&actor)?;

        let deleted = diesel::delete(
            ticket_comments::table
                .filter(ticket_comments::id.eq(comment_id))
                .filter(ticket_comments::ticket_id.eq(ticket_id)),
        )
        .execute(&mut conn)
        .map_err(|e| ApiError::Database(e.to_string()))?;

        if deleted == 0 {
            return Err(ApiError::NotFound("comment not found".to_string()));
        }

        Ok::<(), ApiError>(())
    })
    .await
    .map_err(|e: tokio::task::JoinError| ApiError::Internal(e.to_string()))??;

    Ok(Json(json!({ "success": true })))
}

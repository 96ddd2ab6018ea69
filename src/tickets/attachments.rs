//! Ticket attachment handlers. The service stores metadata only; files
//! live in the blob store and `file_url` is an opaque reference to them.

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
use crate::shared::blob;
use crate::shared::error::ApiError;
use crate::shared::models::{NewTicketAttachment, Profile, TicketAttachment};
use crate::shared::schema::{profiles, ticket_attachments};
use crate::shared::state::AppState;
use crate::web::auth::AuthenticatedUser;

use super::handlers::find_ticket;
use super::policy;
use super::types::{AttachmentWithUploader, CreateAttachmentRequest, ProfileSummary};

pub async fn list_attachments(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(ticket_id): Path<Uuid>,
) -> Result<Json<Vec<AttachmentWithUploader>>, ApiError> {
    let pool = state.conn.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| ApiError::Database(e.to_string()))?;
        load_profile(&mut conn, user.user_id)?;
        find_ticket(&mut conn, ticket_id)?;

        let rows: Vec<TicketAttachment> = ticket_attachments::table
            .filter(ticket_attachments::ticket_id.eq(ticket_id))
            .order(ticket_attachments::created_at.asc())
            .load(&mut conn)
            .map_err(|e| ApiError::Database(e.to_string()))?;

        let mut uploader_ids: Vec<Uuid> = rows.iter().map(|a| a.uploaded_by).collect();
        uploader_ids.sort_unstable();
        uploader_ids.dedup();

        let uploaders: HashMap<Uuid, Profile> = profiles::table
            .filter(profiles::id.eq_any(&uploader_ids))
            .load::<Profile>(&mut conn)
            .map_err(|e| ApiError::Database(e.to_string()))?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let result: Vec<AttachmentWithUploader> = rows
            .into_iter()
            .map(|attachment| AttachmentWithUploader {
                uploader: uploaders
                    .get(&attachment.uploaded_by)
                    .map(ProfileSummary::from),
                attachment,
            })
            .collect();

        Ok::<Vec<AttachmentWithUploader>, ApiError>(result)
    })
    .await
    .map_err(|e: tokio::task::JoinError| ApiError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub async fn create_attachment(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(ticket_id): Path<Uuid>,
    Json(req): Json<CreateAttachmentRequest>,
) -> Result<(StatusCode, Json<AttachmentWithUploader>), ApiError> {
    let file_name = req.file_name.trim().to_string();
    let file_url = req.file_url.trim().to_string();
    if file_name.is_empty() || file_url.is_empty() {
        return Err(ApiError::InvalidInput(
            "file_name and file_url are required".to_string(),
        ));
    }
    if req.file_size <= 0 {
        return Err(ApiError::InvalidInput(
            "file_size must be positive".to_string(),
        ));
    }

    let pool = state.conn.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| ApiError::Database(e.to_string()))?;
        let actor = load_profile(&mut conn, user.user_id)?;
        let ticket = find_ticket(&mut conn, ticket_id)?;
        policy::require_edit(&actor, &ticket)?;

        let row = NewTicketAttachment {
            id: Uuid::new_v4(),
            ticket_id: ticket.id,
            file_name,
            file_url,
            file_size: req.file_size,
            uploaded_by: actor.id,
        };

        let attachment: TicketAttachment = diesel::insert_into(ticket_attachments::table)
            .values(&row)
            .get_result(&mut conn)
            .map_err(|e| ApiError::Database(e.to_string()))?;

        Ok::<AttachmentWithUploader, ApiError>(AttachmentWithUploader {
            uploader: Some(ProfileSummary::from(&actor)),
            attachment,
        })
    })
    .await
    .map_err(|e: tokio::task::JoinError| ApiError::Internal(e.to_string()))??;

    Ok((StatusCode::CREATED, Json(result)))
}

/// Removes the blob first, then the metadata row. Blob removal is
/// best-effort; the row is deleted either way so the attachment disappears
/// from the ticket.
pub async fn delete_attachment(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path((ticket_id, attachment_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let pool = state.conn.clone();
    let attachment = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| ApiError::Database(e.to_string()))?;
        let actor = load_profile(&mut conn, user.user_id)?;
        policy::require_admin(&actor)?;

        let attachment: TicketAttachment = ticket_attachments::table
            .filter(ticket_attachments::id.eq(attachment_id))
            .filter(ticket_attachments::ticket_id.eq(ticket_id))
            .first(&mut conn)
            .optional()
            .map_err(|e| ApiError::Database(e.to_string()))?
            .ok_or_else(|| ApiError::NotFound("attachment not found".to_string()))?;

        Ok::<TicketAttachment, ApiError>(attachment)
    })
    .await
    .map_err(|e: tokio::task::JoinError| ApiError::Internal(e.to_string()))??;

    match &state.blob {
        Some(client) => {
            let key = blob::object_key_from_url(&attachment.file_url);
            blob::remove_object(client, &state.bucket, &key).await;
        }
        None => {
            tracing::warn!(
                "no blob store configured; leaving object behind for {}",
                attachment.file_url
            );
        }
    }

    let pool = state.conn.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| ApiError::Database(e.to_string()))?;
        diesel::delete(ticket_attachments::table.find(attachment.id))
            .execute(&mut conn)
            .map_err(|e| ApiError::Database(e.to_string()))?;
        Ok::<(), ApiError>(())
    })
    .await
    .map_err(|e: tokio::task::JoinError| ApiError::Internal(e.to_string()))??;

    Ok(Json(json!({ "success": true })))
}

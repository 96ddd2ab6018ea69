//! Ticket CRUD handlers.
//!
//! Every handler resolves the caller's profile from the store before
//! touching a ticket, then applies the relationship policy. Store work runs
//! on the blocking pool; the only async hop in the middle is the routing
//! advisor call during creation.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::metrics;
use crate::profiles::load_profile;
use crate::routing::{suggest_routing, RoutingCandidate};
use crate::shared::enums::{TicketStatus, UserRole};
use crate::shared::error::ApiError;
use crate::shared::models::{Department, NewTicket, Profile, Ticket};
use crate::shared::schema::{
    departments, profiles, ticket_attachments, ticket_comments, ticket_history, tickets,
};
use crate::shared::state::AppState;
use crate::web::auth::AuthenticatedUser;

use super::history;
use super::policy;
use super::types::{
    CreateTicketRequest, DepartmentSummary, ListTicketsQuery, ProfileSummary, TicketWithRelations,
    UpdateTicketRequest,
};

pub(super) fn find_ticket(conn: &mut PgConnection, id: Uuid) -> Result<Ticket, ApiError> {
    tickets::table
        .find(id)
        .first::<Ticket>(conn)
        .optional()
        .map_err(|e| ApiError::Database(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound("ticket not found".to_string()))
}

fn with_relations(
    ticket: Ticket,
    department: Option<&Department>,
    creator: Option<&Profile>,
    assignee: Option<&Profile>,
    now: DateTime<Utc>,
) -> TicketWithRelations {
    let elapsed = metrics::elapsed_duration(ticket.created_at, ticket.resolved_at, now);
    TicketWithRelations {
        department: department.map(DepartmentSummary::from),
        creator: creator.map(ProfileSummary::from),
        assignee: assignee.map(ProfileSummary::from),
        elapsed_seconds: elapsed.num_seconds(),
        elapsed_display: metrics::format_duration(elapsed),
        ticket,
    }
}

/// Joins one ticket with its department, creator and assignee rows.
pub(super) fn build_ticket_response(
    conn: &mut PgConnection,
    ticket: Ticket,
) -> Result<TicketWithRelations, ApiError> {
    let department = departments::table
        .find(ticket.department_id)
        .first::<Department>(conn)
        .optional()
        .map_err(|e| ApiError::Database(e.to_string()))?;

    let creator = profiles::table
        .find(ticket.created_by)
        .first::<Profile>(conn)
        .optional()
        .map_err(|e| ApiError::Database(e.to_string()))?;

    let assignee = match ticket.assigned_to {
        Some(id) => profiles::table
            .find(id)
            .first::<Profile>(conn)
            .optional()
            .map_err(|e| ApiError::Database(e.to_string()))?,
        None => None,
    };

    Ok(with_relations(
        ticket,
        department.as_ref(),
        creator.as_ref(),
        assignee.as_ref(),
        Utc::now(),
    ))
}

/// Where the new ticket's department comes from: named by the caller, or
/// picked by the routing advisor from the full list.
enum CandidateSource {
    Explicit(Uuid),
    All(Vec<Department>),
}

pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<TicketWithRelations>), ApiError> {
    let CreateTicketRequest {
        title,
        description,
        department_id,
        priority,
        tags,
        due_date,
    } = req;

    let title = title.trim().to_string();
    let description = description.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::InvalidInput("title is required".to_string()));
    }
    if description.is_empty() {
        return Err(ApiError::InvalidInput("description is required".to_string()));
    }

    let user_id = user.user_id;

    let pool = state.conn.clone();
    let source = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| ApiError::Database(e.to_string()))?;
        load_profile(&mut conn, user_id)?;

        match department_id {
            Some(id) => {
                departments::table
                    .find(id)
                    .first::<Department>(&mut conn)
                    .optional()
                    .map_err(|e| ApiError::Database(e.to_string()))?
                    .ok_or_else(|| ApiError::InvalidInput("unknown department".to_string()))?;
                Ok(CandidateSource::Explicit(id))
            }
            None => {
                let all: Vec<Department> = departments::table
                    .order(departments::name.asc())
                    .load(&mut conn)
                    .map_err(|e| ApiError::Database(e.to_string()))?;
                if all.is_empty() {
                    return Err(ApiError::InvalidInput(
                        "no departments are defined; department_id is required".to_string(),
                    ));
                }
                Ok(CandidateSource::All(all))
            }
        }
    })
    .await
    .map_err(|e: tokio::task::JoinError| ApiError::Internal(e.to_string()))??;

    // An explicit department suppresses the advisor; otherwise its
    // suggestion fills whatever the caller left blank.
    let (department_id, priority, tags, ai_confidence_score) = match source {
        CandidateSource::Explicit(id) => (
            id,
            priority.unwrap_or_default(),
            tags.unwrap_or_default(),
            None,
        ),
        CandidateSource::All(all) => {
            let candidates: Vec<RoutingCandidate> =
                all.iter().map(RoutingCandidate::from).collect();
            let suggestion =
                suggest_routing(state.advisor.as_ref(), &title, &description, &candidates).await?;
            (
                suggestion.department_id,
                priority.unwrap_or(suggestion.suggested_priority),
                tags.unwrap_or(suggestion.suggested_tags),
                Some(suggestion.confidence_score),
            )
        }
    };

    let pool = state.conn.clone();
    let response = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| ApiError::Database(e.to_string()))?;

        let row = NewTicket {
            id: Uuid::new_v4(),
            title,
            description,
            status: TicketStatus::New,
            priority,
            tags,
            created_by: user_id,
            assigned_to: None,
            department_id,
            ai_confidence_score,
            due_date,
        };

        let ticket: Ticket = diesel::insert_into(tickets::table)
            .values(&row)
            .get_result(&mut conn)
            .map_err(|e| match e {
                DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                    ApiError::InvalidInput("unknown department".to_string())
                }
                other => ApiError::Database(other.to_string()),
            })?;

        build_ticket_response(&mut conn, ticket)
    })
    .await
    .map_err(|e: tokio::task::JoinError| ApiError::Internal(e.to_string()))??;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(query): Query<ListTicketsQuery>,
) -> Result<Json<Vec<TicketWithRelations>>, ApiError> {
    let pool = state.conn.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| ApiError::Database(e.to_string()))?;
        let actor = load_profile(&mut conn, user.user_id)?;

        let limit = query.limit.unwrap_or(50).clamp(1, 200);
        let offset = query.offset.unwrap_or(0).max(0);

        let mut q = tickets::table.into_boxed();

        // Non-admins see the same relation that grants them edit rights.
        if actor.role != UserRole::Admin {
            q = match actor.department_id {
                Some(dept) => q.filter(
                    tickets::created_by
                        .eq(actor.id)
                        .or(tickets::assigned_to.eq(actor.id))
                        .or(tickets::department_id.eq(dept)),
                ),
                None => q.filter(
                    tickets::created_by
                        .eq(actor.id)
                        .or(tickets::assigned_to.eq(actor.id)),
                ),
            };
        }

        if let Some(status) = query.status {
            q = q.filter(tickets::status.eq(status));
        }
        if let Some(priority) = query.priority {
            q = q.filter(tickets::priority.eq(priority));
        }
        if let Some(department_id) = query.department_id {
            q = q.filter(tickets::department_id.eq(department_id));
        }
        if let Some(assigned_to) = query.assigned_to {
            q = q.filter(tickets::assigned_to.eq(assigned_to));
        }
        if let Some(created_by) = query.created_by {
            q = q.filter(tickets::created_by.eq(created_by));
        }
        if let Some(search) = query.search {
            let pattern = format!("%{search}%");
            q = q.filter(
                tickets::title
                    .ilike(pattern.clone())
                    .or(tickets::description.ilike(pattern.clone()))
                    .or(tickets::ticket_number.ilike(pattern)),
            );
        }

        let rows: Vec<Ticket> = q
            .order(tickets::created_at.desc())
            .limit(limit)
            .offset(offset)
            .load(&mut conn)
            .map_err(|e| ApiError::Database(e.to_string()))?;

        let mut department_ids: Vec<Uuid> = rows.iter().map(|t| t.department_id).collect();
        department_ids.sort_unstable();
        department_ids.dedup();

        let mut profile_ids: Vec<Uuid> = rows
            .iter()
            .flat_map(|t| [Some(t.created_by), t.assigned_to])
            .flatten()
            .collect();
        profile_ids.sort_unstable();
        profile_ids.dedup();

        let departments_by_id: HashMap<Uuid, Department> = departments::table
            .filter(departments::id.eq_any(&department_ids))
            .load::<Department>(&mut conn)
            .map_err(|e| ApiError::Database(e.to_string()))?
            .into_iter()
            .map(|d| (d.id, d))
            .collect();

        let profiles_by_id: HashMap<Uuid, Profile> = profiles::table
            .filter(profiles::id.eq_any(&profile_ids))
            .load::<Profile>(&mut conn)
            .map_err(|e| ApiError::Database(e.to_string()))?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let now = Utc::now();
        let result: Vec<TicketWithRelations> = rows
            .into_iter()
            .map(|ticket| {
                let department = departments_by_id.get(&ticket.department_id);
                let creator = profiles_by_id.get(&ticket.created_by);
                let assignee = ticket.assigned_to.and_then(|id| profiles_by_id.get(&id));
                with_relations(ticket, department, creator, assignee, now)
            })
            .collect();

        Ok::<Vec<TicketWithRelations>, ApiError>(result)
    })
    .await
    .map_err(|e: tokio::task::JoinError| ApiError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketWithRelations>, ApiError> {
    let pool = state.conn.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| ApiError::Database(e.to_string()))?;
        let actor = load_profile(&mut conn, user.user_id)?;
        let ticket = find_ticket(&mut conn, id)?;
        policy::require_view(&actor, &ticket)?;
        build_ticket_response(&mut conn, ticket)
    })
    .await
    .map_err(|e: tokio::task::JoinError| ApiError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTicketRequest>,
) -> Result<Json<TicketWithRelations>, ApiError> {
    let pool = state.conn.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| ApiError::Database(e.to_string()))?;
        let actor = load_profile(&mut conn, user.user_id)?;
        let ticket = find_ticket(&mut conn, id)?;
        policy::require_edit(&actor, &ticket)?;

        let (changes, tracked) = history::collect_changes(&ticket, &req, Utc::now())?;
        if changes.is_empty() {
            return Err(ApiError::InvalidInput("nothing to update".to_string()));
        }

        let updated: Ticket = diesel::update(tickets::table.find(ticket.id))
            .set(&changes)
            .get_result(&mut conn)
            .map_err(|e| match e {
                DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                    ApiError::InvalidInput(
                        "referenced department or profile does not exist".to_string(),
                    )
                }
                other => ApiError::Database(other.to_string()),
            })?;

        // Audit rows ride behind the committed update.
        history::record_changes(&mut conn, updated.id, actor.id, &tracked);

        build_ticket_response(&mut conn, updated)
    })
    .await
    .map_err(|e: tokio::task::JoinError| ApiError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub async fn delete_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let pool = state.conn.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| ApiError::Database(e.to_string()))?;
        let actor = load_profile(&mut conn, user.user_id)?;
        policy::require_admin(&actor)?;
        let ticket = find_ticket(&mut conn, id)?;

        conn.transaction::<_, DieselError, _>(|conn| {
            diesel::delete(
                ticket_comments::table.filter(ticket_comments::ticket_id.eq(ticket.id)),
            )
            .execute(conn)?;
            diesel::delete(
                ticket_attachments::table.filter(ticket_attachments::ticket_id.eq(ticket.id)),
            )
            .execute(conn)?;
            diesel::delete(ticket_history::table.filter(ticket_history::ticket_id.eq(ticket.id)))
                .execute(conn)?;
            diesel::delete(tickets::table.find(ticket.id)).execute(conn)?;
            Ok(())
        })
        .map_err(|e| ApiError::Database(e.to_string()))?;

        Ok::<(), ApiError>(())
    })
    .await
    .map_err(|e: tokio::task::JoinError| ApiError::Internal(e.to_string()))??;

    Ok(Json(json!({ "success": true })))
}

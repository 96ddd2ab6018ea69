//! Dashboard counters derived from the tickets table on demand.
//!
//! `/api/stats` aggregates over the caller's visible tickets in one pass;
//! `/api/stats/departments` fans out one read-only count per department and
//! joins the results.

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::metrics;
use crate::profiles::load_profile;
use crate::shared::enums::{TicketStatus, UserRole};
use crate::shared::error::ApiError;
use crate::shared::models::Department;
use crate::shared::schema::{departments, tickets};
use crate::shared::state::AppState;
use crate::tickets::policy;
use crate::web::auth::AuthenticatedUser;

type StatsRow = (
    TicketStatus,
    Uuid,
    Option<Uuid>,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
);

#[derive(Debug, Serialize)]
pub struct TicketStats {
    pub total: i64,
    pub open: i64,
    pub pending: i64,
    pub resolved: i64,
    pub closed: i64,
    pub my_tickets: i64,
    pub assigned_to_me: i64,
    pub avg_resolution_seconds: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct DepartmentLoad {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub open_tickets: i64,
}

fn summarize(rows: &[StatsRow], actor_id: Uuid, now: DateTime<Utc>) -> TicketStats {
    let mut stats = TicketStats {
        total: rows.len() as i64,
        open: 0,
        pending: 0,
        resolved: 0,
        closed: 0,
        my_tickets: 0,
        assigned_to_me: 0,
        avg_resolution_seconds: None,
    };

    let mut resolution_total = 0i64;
    let mut resolution_count = 0i64;

    for (status, created_by, assigned_to, created_at, resolved_at) in rows {
        match status {
            TicketStatus::New | TicketStatus::InProgress => stats.open += 1,
            TicketStatus::Pending => stats.pending += 1,
            TicketStatus::Resolved => stats.resolved += 1,
            TicketStatus::Closed => stats.closed += 1,
        }
        if *created_by == actor_id {
            stats.my_tickets += 1;
        }
        if *assigned_to == Some(actor_id) {
            stats.assigned_to_me += 1;
        }
        if resolved_at.is_some() {
            resolution_total +=
                metrics::elapsed_duration(*created_at, *resolved_at, now).num_seconds();
            resolution_count += 1;
        }
    }

    if resolution_count > 0 {
        stats.avg_resolution_seconds = Some(resolution_total / resolution_count);
    }

    stats
}

pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<TicketStats>, ApiError> {
    let pool = state.conn.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| ApiError::Database(e.to_string()))?;
        let actor = load_profile(&mut conn, user.user_id)?;

        let mut q = tickets::table
            .select((
                tickets::status,
                tickets::created_by,
                tickets::assigned_to,
                tickets::created_at,
                tickets::resolved_at,
            ))
            .into_boxed();

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

        let rows: Vec<StatsRow> = q
            .load(&mut conn)
            .map_err(|e| ApiError::Database(e.to_string()))?;

        Ok::<TicketStats, ApiError>(summarize(&rows, actor.id, Utc::now()))
    })
    .await
    .map_err(|e: tokio::task::JoinError| ApiError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub async fn department_stats(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<DepartmentLoad>>, ApiError> {
    let pool = state.conn.clone();
    let all = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| ApiError::Database(e.to_string()))?;
        let actor = load_profile(&mut conn, user.user_id)?;
        policy::require_admin(&actor)?;

        let rows: Vec<Department> = departments::table
            .order(departments::name.asc())
            .load(&mut conn)
            .map_err(|e| ApiError::Database(e.to_string()))?;

        Ok::<Vec<Department>, ApiError>(rows)
    })
    .await
    .map_err(|e: tokio::task::JoinError| ApiError::Internal(e.to_string()))??;

    let tasks = all.into_iter().map(|department| {
        let pool = state.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| ApiError::Database(e.to_string()))?;
            let open_tickets: i64 = tickets::table
                .filter(tickets::department_id.eq(department.id))
                .filter(tickets::status.eq_any([
                    TicketStatus::New,
                    TicketStatus::InProgress,
                    TicketStatus::Pending,
                ]))
                .count()
                .get_result(&mut conn)
                .map_err(|e| ApiError::Database(e.to_string()))?;

            Ok::<DepartmentLoad, ApiError>(DepartmentLoad {
                id: department.id,
                name: department.name,
                color: department.color,
                open_tickets,
            })
        })
    });

    let mut result = Vec::new();
    for joined in futures::future::join_all(tasks).await {
        result.push(joined.map_err(|e| ApiError::Internal(e.to_string()))??);
    }
    result.sort_by(|a, b| b.open_tickets.cmp(&a.open_tickets));

    Ok(Json(result))
}

pub fn configure_stats_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/stats", get(get_stats))
        .route("/api/stats/departments", get(department_stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn row(
        status: TicketStatus,
        created_by: Uuid,
        assigned_to: Option<Uuid>,
        created: i64,
        resolved: Option<i64>,
    ) -> StatsRow {
        (status, created_by, assigned_to, at(created), resolved.map(at))
    }

    #[test]
    fn statuses_fall_into_the_right_buckets() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let rows = vec![
            row(TicketStatus::New, me, None, 0, None),
            row(TicketStatus::InProgress, other, Some(me), 0, None),
            row(TicketStatus::Pending, other, None, 0, None),
            row(TicketStatus::Resolved, me, None, 0, Some(100)),
            row(TicketStatus::Closed, other, None, 0, Some(300)),
        ];

        let stats = summarize(&rows, me, at(1_000));
        assert_eq!(stats.total, 5);
        assert_eq!(stats.open, 2);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.closed, 1);
        assert_eq!(stats.my_tickets, 2);
        assert_eq!(stats.assigned_to_me, 1);
    }

    #[test]
    fn resolution_average_covers_tickets_with_a_resolution_time() {
        let me = Uuid::new_v4();
        let rows = vec![
            row(TicketStatus::Resolved, me, None, 0, Some(100)),
            row(TicketStatus::Closed, me, None, 0, Some(300)),
            row(TicketStatus::New, me, None, 0, None),
        ];

        let stats = summarize(&rows, me, at(10_000));
        assert_eq!(stats.avg_resolution_seconds, Some(200));
    }

    #[test]
    fn no_resolved_tickets_means_no_average() {
        let me = Uuid::new_v4();
        let rows = vec![row(TicketStatus::New, me, None, 0, None)];
        assert_eq!(summarize(&rows, me, at(50)).avg_resolution_seconds, None);
        assert_eq!(summarize(&[], me, at(50)).avg_resolution_seconds, None);
    }
}

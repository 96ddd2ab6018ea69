//! Department handlers. Reads are open to any authenticated caller;
//! everything that changes a department goes through the admin surface.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::profiles::load_profile;
use crate::shared::error::ApiError;
use crate::shared::models::{Department, DepartmentChanges, NewDepartment};
use crate::shared::schema::{departments, profiles, tickets};
use crate::shared::state::AppState;
use crate::tickets::policy;
use crate::web::auth::AuthenticatedUser;

const DEFAULT_COLOR: &str = "#6366f1";

#[derive(Debug, Deserialize)]
pub struct CreateDepartmentRequest {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub manager_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDepartmentRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "crate::tickets::types::double_option")]
    pub description: Option<Option<String>>,
    pub color: Option<String>,
    #[serde(default, deserialize_with = "crate::tickets::types::double_option")]
    pub manager_id: Option<Option<Uuid>>,
}

impl UpdateDepartmentRequest {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.color.is_none()
            && self.manager_id.is_none()
    }
}

fn map_write_error(e: DieselError) -> ApiError {
    match e {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            ApiError::Conflict("department name already exists".to_string())
        }
        other => ApiError::Database(other.to_string()),
    }
}

pub async fn list_departments(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Department>>, ApiError> {
    let pool = state.conn.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| ApiError::Database(e.to_string()))?;
        load_profile(&mut conn, user.user_id)?;

        let rows: Vec<Department> = departments::table
            .order(departments::name.asc())
            .load(&mut conn)
            .map_err(|e| ApiError::Database(e.to_string()))?;

        Ok::<Vec<Department>, ApiError>(rows)
    })
    .await
    .map_err(|e: tokio::task::JoinError| ApiError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub async fn admin_list_departments(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Department>>, ApiError> {
    let pool = state.conn.clone();
    let result = tokio::task::spawn_blocking(move || {
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

    Ok(Json(result))
}

pub async fn get_department(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Department>, ApiError> {
    let pool = state.conn.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| ApiError::Database(e.to_string()))?;
        load_profile(&mut conn, user.user_id)?;

        let department: Department = departments::table
            .find(id)
            .first(&mut conn)
            .optional()
            .map_err(|e| ApiError::Database(e.to_string()))?
            .ok_or_else(|| ApiError::NotFound("department not found".to_string()))?;

        Ok::<Department, ApiError>(department)
    })
    .await
    .map_err(|e: tokio::task::JoinError| ApiError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub async fn create_department(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateDepartmentRequest>,
) -> Result<(StatusCode, Json<Department>), ApiError> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::InvalidInput("name is required".to_string()));
    }

    let pool = state.conn.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| ApiError::Database(e.to_string()))?;
        let actor = load_profile(&mut conn, user.user_id)?;
        policy::require_admin(&actor)?;

        let row = NewDepartment {
            id: Uuid::new_v4(),
            name,
            description: req.description,
            color: req.color.unwrap_or_else(|| DEFAULT_COLOR.to_string()),
            manager_id: req.manager_id,
        };

        let department: Department = diesel::insert_into(departments::table)
            .values(&row)
            .get_result(&mut conn)
            .map_err(map_write_error)?;

        Ok::<Department, ApiError>(department)
    })
    .await
    .map_err(|e: tokio::task::JoinError| ApiError::Internal(e.to_string()))??;

    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn update_department(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateDepartmentRequest>,
) -> Result<Json<Department>, ApiError> {
    if req.is_empty() {
        return Err(ApiError::InvalidInput("nothing to update".to_string()));
    }

    let name = match &req.name {
        Some(name) => {
            let name = name.trim();
            if name.is_empty() {
                return Err(ApiError::InvalidInput("name cannot be empty".to_string()));
            }
            Some(name.to_string())
        }
        None => None,
    };

    let pool = state.conn.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| ApiError::Database(e.to_string()))?;
        let actor = load_profile(&mut conn, user.user_id)?;
        policy::require_admin(&actor)?;

        departments::table
            .find(id)
            .first::<Department>(&mut conn)
            .optional()
            .map_err(|e| ApiError::Database(e.to_string()))?
            .ok_or_else(|| ApiError::NotFound("department not found".to_string()))?;

        let changes = DepartmentChanges {
            name,
            description: req.description,
            color: req.color,
            manager_id: req.manager_id,
        };

        let updated: Department = diesel::update(departments::table.find(id))
            .set(&changes)
            .get_result(&mut conn)
            .map_err(map_write_error)?;

        Ok::<Department, ApiError>(updated)
    })
    .await
    .map_err(|e: tokio::task::JoinError| ApiError::Internal(e.to_string()))??;

    Ok(Json(result))
}

/// Refuses to delete while any ticket still points at the department;
/// member profiles are detached rather than blocking the delete.
pub async fn delete_department(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let pool = state.conn.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| ApiError::Database(e.to_string()))?;
        let actor = load_profile(&mut conn, user.user_id)?;
        policy::require_admin(&actor)?;

        let in_use: i64 = tickets::table
            .filter(tickets::department_id.eq(id))
            .count()
            .get_result(&mut conn)
            .map_err(|e| ApiError::Database(e.to_string()))?;
        if in_use > 0 {
            return Err(ApiError::Conflict(format!(
                "department still has {in_use} tickets; reassign them first"
            )));
        }

        let deleted = conn
            .transaction::<usize, DieselError, _>(|conn| {
                diesel::update(profiles::table.filter(profiles::department_id.eq(id)))
                    .set(profiles::department_id.eq(None::<Uuid>))
                    .execute(conn)?;
                diesel::delete(departments::table.find(id)).execute(conn)
            })
            .map_err(|e| ApiError::Database(e.to_string()))?;

        if deleted == 0 {
            return Err(ApiError::NotFound("department not found".to_string()));
        }

        Ok::<(), ApiError>(())
    })
    .await
    .map_err(|e: tokio::task::JoinError| ApiError::Internal(e.to_string()))??;

    Ok(Json(json!({ "success": true })))
}

pub fn configure_departments_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/departments", get(list_departments))
        .route(
            "/api/admin/departments",
            get(admin_list_departments).post(create_department),
        )
        .route(
            "/api/admin/departments/:id",
            get(get_department)
                .patch(update_department)
                .delete(delete_department),
        )
}

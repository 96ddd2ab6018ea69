//! Profile handlers, and the profile lookup every other module leans on.
//!
//! Accounts are provisioned by the identity provider; this service owns the
//! profile row (display name, role, department). Role changes and department
//! moves are admin operations on other people's profiles.

use axum::{
    extract::{Path, State},
    routing::{get, patch},
    Json, Router,
};
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::shared::enums::UserRole;
use crate::shared::error::ApiError;
use crate::shared::models::{Department, Profile, ProfileChanges};
use crate::shared::schema::{departments, profiles};
use crate::shared::state::AppState;
use crate::tickets::policy;
use crate::tickets::types::DepartmentSummary;
use crate::web::auth::AuthenticatedUser;

/// Resolves the caller's profile row. A valid token without a profile row
/// counts as unauthenticated, not as an empty profile.
pub fn load_profile(conn: &mut PgConnection, id: Uuid) -> Result<Profile, ApiError> {
    profiles::table
        .find(id)
        .first::<Profile>(conn)
        .optional()
        .map_err(|e| ApiError::Database(e.to_string()))?
        .ok_or_else(|| ApiError::Unauthenticated("no profile for this account".to_string()))
}

#[derive(Debug, Serialize)]
pub struct ProfileWithDepartment {
    #[serde(flatten)]
    pub profile: Profile,
    pub department: Option<DepartmentSummary>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
}

/// Admin edit of another profile. `department_id: null` detaches the
/// profile from its department; the role arrives as its wire token so a bad
/// value reports as invalid input rather than a body parse failure.
#[derive(Debug, Deserialize)]
pub struct AdminUpdateProfileRequest {
    pub role: Option<String>,
    #[serde(default, deserialize_with = "crate::tickets::types::double_option")]
    pub department_id: Option<Option<Uuid>>,
}

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<ProfileWithDepartment>, ApiError> {
    let pool = state.conn.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| ApiError::Database(e.to_string()))?;
        let actor = load_profile(&mut conn, user.user_id)?;

        let department = match actor.department_id {
            Some(id) => departments::table
                .find(id)
                .first::<Department>(&mut conn)
                .optional()
                .map_err(|e| ApiError::Database(e.to_string()))?,
            None => None,
        };

        Ok::<ProfileWithDepartment, ApiError>(ProfileWithDepartment {
            department: department.as_ref().map(DepartmentSummary::from),
            profile: actor,
        })
    })
    .await
    .map_err(|e: tokio::task::JoinError| ApiError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<Profile>, ApiError> {
    let full_name = req
        .full_name
        .as_deref()
        .map(str::trim)
        .unwrap_or("")
        .to_string();
    if full_name.is_empty() {
        return Err(ApiError::InvalidInput("full_name is required".to_string()));
    }

    let pool = state.conn.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| ApiError::Database(e.to_string()))?;
        let actor = load_profile(&mut conn, user.user_id)?;

        let changes = ProfileChanges {
            full_name: Some(full_name),
            updated_at: Some(Utc::now()),
            ..Default::default()
        };

        let updated: Profile = diesel::update(profiles::table.find(actor.id))
            .set(&changes)
            .get_result(&mut conn)
            .map_err(|e| ApiError::Database(e.to_string()))?;

        Ok::<Profile, ApiError>(updated)
    })
    .await
    .map_err(|e: tokio::task::JoinError| ApiError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub async fn list_profiles(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<ProfileWithDepartment>>, ApiError> {
    let pool = state.conn.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| ApiError::Database(e.to_string()))?;
        let actor = load_profile(&mut conn, user.user_id)?;
        policy::require_admin(&actor)?;

        let rows: Vec<Profile> = profiles::table
            .order(profiles::full_name.asc())
            .load(&mut conn)
            .map_err(|e| ApiError::Database(e.to_string()))?;

        let mut department_ids: Vec<Uuid> = rows.iter().filter_map(|p| p.department_id).collect();
        department_ids.sort_unstable();
        department_ids.dedup();

        let departments_by_id: HashMap<Uuid, Department> = departments::table
            .filter(departments::id.eq_any(&department_ids))
            .load::<Department>(&mut conn)
            .map_err(|e| ApiError::Database(e.to_string()))?
            .into_iter()
            .map(|d| (d.id, d))
            .collect();

        let result: Vec<ProfileWithDepartment> = rows
            .into_iter()
            .map(|profile| ProfileWithDepartment {
                department: profile
                    .department_id
                    .and_then(|id| departments_by_id.get(&id))
                    .map(DepartmentSummary::from),
                profile,
            })
            .collect();

        Ok::<Vec<ProfileWithDepartment>, ApiError>(result)
    })
    .await
    .map_err(|e: tokio::task::JoinError| ApiError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub async fn admin_update_profile(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AdminUpdateProfileRequest>,
) -> Result<Json<Profile>, ApiError> {
    if req.role.is_none() && req.department_id.is_none() {
        return Err(ApiError::InvalidInput("nothing to update".to_string()));
    }

    let role: Option<UserRole> = match &req.role {
        Some(token) => Some(token.parse().map_err(ApiError::InvalidInput)?),
        None => None,
    };

    let pool = state.conn.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| ApiError::Database(e.to_string()))?;
        let actor = load_profile(&mut conn, user.user_id)?;
        policy::require_admin(&actor)?;

        profiles::table
            .find(id)
            .first::<Profile>(&mut conn)
            .optional()
            .map_err(|e| ApiError::Database(e.to_string()))?
            .ok_or_else(|| ApiError::NotFound("profile not found".to_string()))?;

        if let Some(Some(department_id)) = req.department_id {
            departments::table
                .find(department_id)
                .first::<Department>(&mut conn)
                .optional()
                .map_err(|e| ApiError::Database(e.to_string()))?
                .ok_or_else(|| ApiError::InvalidInput("unknown department".to_string()))?;
        }

        let changes = ProfileChanges {
            role,
            department_id: req.department_id,
            updated_at: Some(Utc::now()),
            ..Default::default()
        };

        let updated: Profile = diesel::update(profiles::table.find(id))
            .set(&changes)
            .get_result(&mut conn)
            .map_err(|e| ApiError::Database(e.to_string()))?;

        Ok::<Profile, ApiError>(updated)
    })
    .await
    .map_err(|e: tokio::task::JoinError| ApiError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub fn configure_profiles_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/profile", get(get_profile).patch(update_profile))
        .route("/api/admin/profiles", get(list_profiles))
        .route("/api/admin/profiles/:id", patch(admin_update_profile))
}

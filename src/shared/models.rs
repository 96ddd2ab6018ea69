//! Row types for the desk schema. Queryable structs mirror column order in
//! `shared::schema`; insert and changeset structs carry only the columns the
//! service supplies, leaving store defaults (ticket_number, timestamps) to
//! the store.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{TicketPriority, TicketStatus, UserRole};
use super::schema::{
    departments, profiles, ticket_attachments, ticket_comments, ticket_history, tickets,
};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = departments)]
pub struct Department {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub manager_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = departments)]
pub struct NewDepartment {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub manager_id: Option<Uuid>,
}

/// Admin department edit. `None` leaves a column untouched; the inner
/// `Option` distinguishes "set" from "clear" on nullable columns.
#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = departments)]
pub struct DepartmentChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub color: Option<String>,
    pub manager_id: Option<Option<Uuid>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = profiles)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: String,
    pub role: UserRole,
    pub department_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = profiles)]
pub struct ProfileChanges {
    pub full_name: Option<String>,
    pub role: Option<UserRole>,
    pub department_id: Option<Option<Uuid>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = tickets)]
pub struct Ticket {
    pub id: Uuid,
    pub ticket_number: String,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub tags: Vec<String>,
    pub created_by: Uuid,
    pub assigned_to: Option<Uuid>,
    pub department_id: Uuid,
    pub ai_confidence_score: Option<f64>,
    pub due_date: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert row for a new ticket. `ticket_number`, `resolved_at` and the
/// timestamps come back from the store via RETURNING.
#[derive(Debug, Insertable)]
#[diesel(table_name = tickets)]
pub struct NewTicket {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub tags: Vec<String>,
    pub created_by: Uuid,
    pub assigned_to: Option<Uuid>,
    pub department_id: Uuid,
    pub ai_confidence_score: Option<f64>,
    pub due_date: Option<DateTime<Utc>>,
}

/// One update statement covering every changed field of a ticket edit.
#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = tickets)]
pub struct TicketChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub tags: Option<Vec<String>>,
    pub assigned_to: Option<Option<Uuid>>,
    pub department_id: Option<Uuid>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub resolved_at: Option<Option<DateTime<Utc>>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TicketChanges {
    /// True when no caller-editable field is set. `resolved_at` and
    /// `updated_at` are bookkeeping and do not count.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.tags.is_none()
            && self.assigned_to.is_none()
            && self.department_id.is_none()
            && self.due_date.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = ticket_comments)]
pub struct TicketComment {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub user_id: Uuid,
    pub comment: String,
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = ticket_comments)]
pub struct NewTicketComment {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub user_id: Uuid,
    pub comment: String,
    pub is_internal: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = ticket_attachments)]
pub struct TicketAttachment {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub file_name: String,
    pub file_url: String,
    pub file_size: i64,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = ticket_attachments)]
pub struct NewTicketAttachment {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub file_name: String,
    pub file_url: String,
    pub file_size: i64,
    pub uploaded_by: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = ticket_history)]
pub struct TicketHistoryEntry {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub changed_by: Uuid,
    pub field_name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = ticket_history)]
pub struct NewTicketHistoryEntry {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub changed_by: Uuid,
    pub field_name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::shared::enums::{TicketPriority, TicketStatus, UserRole};
use crate::shared::models::{Department, Profile, Ticket, TicketAttachment, TicketComment};

/// Distinguishes an absent field from an explicit `null` in a PATCH body.
/// Absent means "leave unchanged", `null` means "clear the value".
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub title: String,
    pub description: String,
    pub department_id: Option<Uuid>,
    pub priority: Option<TicketPriority>,
    pub tags: Option<Vec<String>>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Caller-editable fields. Anything else in the body is ignored, not
/// rejected.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTicketRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    #[serde(default, deserialize_with = "double_option")]
    pub assigned_to: Option<Option<Uuid>>,
    pub department_id: Option<Uuid>,
    pub tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

#[derive(Debug, Deserialize)]
pub struct ListTicketsQuery {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub department_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub comment: String,
    pub is_internal: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAttachmentRequest {
    pub file_name: String,
    pub file_url: String,
    pub file_size: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummary {
    pub id: Uuid,
    pub full_name: String,
}

impl From<&Profile> for ProfileSummary {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id,
            full_name: profile.full_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentAuthor {
    pub id: Uuid,
    pub full_name: String,
    pub role: UserRole,
}

impl From<&Profile> for CommentAuthor {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id,
            full_name: profile.full_name.clone(),
            role: profile.role,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DepartmentSummary {
    pub id: Uuid,
    pub name: String,
    pub color: String,
}

impl From<&Department> for DepartmentSummary {
    fn from(department: &Department) -> Self {
        Self {
            id: department.id,
            name: department.name.clone(),
            color: department.color.clone(),
        }
    }
}

/// Ticket with its read-time projections: related rows plus the derived
/// elapsed time (creation to resolution, or to now while open).
#[derive(Debug, Serialize)]
pub struct TicketWithRelations {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub department: Option<DepartmentSummary>,
    pub creator: Option<ProfileSummary>,
    pub assignee: Option<ProfileSummary>,
    pub elapsed_seconds: i64,
    pub elapsed_display: String,
}

#[derive(Debug, Serialize)]
pub struct CommentWithAuthor {
    #[serde(flatten)]
    pub comment: TicketComment,
    pub user: Option<CommentAuthor>,
}

#[derive(Debug, Serialize)]
pub struct AttachmentWithUploader {
    #[serde(flatten)]
    pub attachment: TicketAttachment,
    pub uploader: Option<ProfileSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_body_distinguishes_absent_from_null() {
        let req: UpdateTicketRequest = serde_json::from_str(r#"{"title": "new title"}"#).unwrap();
        assert!(req.assigned_to.is_none());
        assert!(req.due_date.is_none());

        let req: UpdateTicketRequest =
            serde_json::from_str(r#"{"assigned_to": null, "due_date": null}"#).unwrap();
        assert_eq!(req.assigned_to, Some(None));
        assert_eq!(req.due_date, Some(None));

        let id = Uuid::new_v4();
        let req: UpdateTicketRequest =
            serde_json::from_str(&format!(r#"{{"assigned_to": "{id}"}}"#)).unwrap();
        assert_eq!(req.assigned_to, Some(Some(id)));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let req: UpdateTicketRequest =
            serde_json::from_str(r#"{"status": "pending", "ticket_number": "TKT-000001"}"#)
                .unwrap();
        assert_eq!(req.status, Some(TicketStatus::Pending));
    }
}

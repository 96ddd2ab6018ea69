//! Field-level change tracking for ticket edits.
//!
//! `collect_changes` diffs a PATCH body against the stored row and produces
//! both the changeset for the single UPDATE and the audit rows describing
//! it. `record_changes` appends those rows after the update commits; a
//! failure there is logged and swallowed so the caller still sees the
//! committed edit.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::shared::enums::TicketStatus;
use crate::shared::error::ApiError;
use crate::shared::models::{NewTicketHistoryEntry, Ticket, TicketChanges};
use crate::shared::schema::ticket_history;

use super::types::UpdateTicketRequest;

/// One tracked field that changed, with both sides stringified for the
/// audit log. `None` stands for SQL NULL (the field had, or now has, no
/// value).
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field_name: &'static str,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

/// Diffs the request against the stored ticket. Provided-but-equal fields
/// are skipped; `resolved_at` bookkeeping rides along with status changes
/// but is not itself a tracked field. Returns the changeset plus one
/// `FieldChange` per tracked field that actually changed.
pub fn collect_changes(
    ticket: &Ticket,
    req: &UpdateTicketRequest,
    now: DateTime<Utc>,
) -> Result<(TicketChanges, Vec<FieldChange>), ApiError> {
    let mut changes = TicketChanges::default();
    let mut tracked = Vec::new();

    if let Some(title) = &req.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(ApiError::InvalidInput("title cannot be empty".to_string()));
        }
        if title != ticket.title {
            tracked.push(FieldChange {
                field_name: "title",
                old_value: Some(ticket.title.clone()),
                new_value: Some(title.to_string()),
            });
            changes.title = Some(title.to_string());
        }
    }

    if let Some(description) = &req.description {
        let description = description.trim();
        if description.is_empty() {
            return Err(ApiError::InvalidInput(
                "description cannot be empty".to_string(),
            ));
        }
        if description != ticket.description {
            tracked.push(FieldChange {
                field_name: "description",
                old_value: Some(ticket.description.clone()),
                new_value: Some(description.to_string()),
            });
            changes.description = Some(description.to_string());
        }
    }

    if let Some(status) = req.status {
        if status != ticket.status {
            tracked.push(FieldChange {
                field_name: "status",
                old_value: Some(ticket.status.as_str().to_string()),
                new_value: Some(status.as_str().to_string()),
            });
            changes.status = Some(status);
            // resolved_at follows the status: stamped on resolve, kept on
            // close, cleared when the ticket reopens.
            if status == TicketStatus::Resolved {
                changes.resolved_at = Some(Some(now));
            } else if status != TicketStatus::Closed && ticket.resolved_at.is_some() {
                changes.resolved_at = Some(None);
            }
        }
    }

    if let Some(priority) = req.priority {
        if priority != ticket.priority {
            tracked.push(FieldChange {
                field_name: "priority",
                old_value: Some(ticket.priority.as_str().to_string()),
                new_value: Some(priority.as_str().to_string()),
            });
            changes.priority = Some(priority);
        }
    }

    if let Some(assigned_to) = req.assigned_to {
        if assigned_to != ticket.assigned_to {
            tracked.push(FieldChange {
                field_name: "assigned_to",
                old_value: ticket.assigned_to.map(|id| id.to_string()),
                new_value: assigned_to.map(|id| id.to_string()),
            });
            changes.assigned_to = Some(assigned_to);
        }
    }

    if let Some(department_id) = req.department_id {
        if department_id != ticket.department_id {
            tracked.push(FieldChange {
                field_name: "department_id",
                old_value: Some(ticket.department_id.to_string()),
                new_value: Some(department_id.to_string()),
            });
            changes.department_id = Some(department_id);
        }
    }

    if let Some(tags) = &req.tags {
        if *tags != ticket.tags {
            tracked.push(FieldChange {
                field_name: "tags",
                old_value: Some(serde_json::to_string(&ticket.tags).unwrap_or_default()),
                new_value: Some(serde_json::to_string(tags).unwrap_or_default()),
            });
            changes.tags = Some(tags.clone());
        }
    }

    if let Some(due_date) = req.due_date {
        if due_date != ticket.due_date {
            tracked.push(FieldChange {
                field_name: "due_date",
                old_value: ticket.due_date.map(|d| d.to_rfc3339()),
                new_value: due_date.map(|d| d.to_rfc3339()),
            });
            changes.due_date = Some(due_date);
        }
    }

    if !changes.is_empty() {
        changes.updated_at = Some(now);
    }

    Ok((changes, tracked))
}

/// Appends one history row per changed field. Best-effort: the update has
/// already committed, so an insert failure is logged and the response
/// proceeds without it.
pub fn record_changes(
    conn: &mut PgConnection,
    ticket_id: Uuid,
    changed_by: Uuid,
    changes: &[FieldChange],
) {
    if changes.is_empty() {
        return;
    }

    let rows: Vec<NewTicketHistoryEntry> = changes
        .iter()
        .map(|change| NewTicketHistoryEntry {
            id: Uuid::new_v4(),
            ticket_id,
            changed_by,
            field_name: change.field_name.to_string(),
            old_value: change.old_value.clone(),
            new_value: change.new_value.clone(),
        })
        .collect();

    if let Err(e) = diesel::insert_into(ticket_history::table)
        .values(&rows)
        .execute(conn)
    {
        tracing::warn!("failed to record history for ticket {ticket_id}: {e}");
    }
}

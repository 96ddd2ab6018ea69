//! Authorization rules for ticket mutations.
//!
//! Editing is relationship-based: admins, the creator, the current assignee,
//! and every member of the owning department may edit. The department grant
//! is intentionally broad (shared-queue triage) and must not be narrowed.
//! Deletes are admin-only regardless of those relationships. Handlers
//! resolve the caller's profile first and pass it in, so these functions
//! stay pure.

use crate::shared::enums::UserRole;
use crate::shared::error::ApiError;
use crate::shared::models::{Profile, Ticket};

pub fn can_edit(actor: &Profile, ticket: &Ticket) -> bool {
    actor.role == UserRole::Admin
        || actor.id == ticket.created_by
        || ticket.assigned_to == Some(actor.id)
        || actor.department_id == Some(ticket.department_id)
}

/// Read visibility is the same relation as edit permission. Department
/// reassignment therefore applies to reads and edits alike on the next
/// request; there is no grandfathered access to the old department.
pub fn can_view(actor: &Profile, ticket: &Ticket) -> bool {
    can_edit(actor, ticket)
}

pub fn require_edit(actor: &Profile, ticket: &Ticket) -> Result<(), ApiError> {
    if can_edit(actor, ticket) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "no permission to modify this ticket".to_string(),
        ))
    }
}

pub fn require_view(actor: &Profile, ticket: &Ticket) -> Result<(), ApiError> {
    if can_view(actor, ticket) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "no permission to view this ticket".to_string(),
        ))
    }
}

pub fn require_admin(actor: &Profile) -> Result<(), ApiError> {
    if actor.role == UserRole::Admin {
        Ok(())
    } else {
        Err(ApiError::Forbidden("admin role required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::enums::{TicketPriority, TicketStatus};
    use chrono::Utc;
    use rand::seq::SliceRandom;
    use rand::Rng;
    use uuid::Uuid;

    fn profile(role: UserRole, department_id: Option<Uuid>) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            full_name: "Test User".to_string(),
            role,
            department_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn ticket(created_by: Uuid, assigned_to: Option<Uuid>, department_id: Uuid) -> Ticket {
        Ticket {
            id: Uuid::new_v4(),
            ticket_number: "TKT-000042".to_string(),
            title: "Printer broken".to_string(),
            description: "It only prints blank pages".to_string(),
            status: TicketStatus::New,
            priority: TicketPriority::Normal,
            tags: vec![],
            created_by,
            assigned_to,
            department_id,
            ai_confidence_score: None,
            due_date: None,
            resolved_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn admin_can_always_edit() {
        let admin = profile(UserRole::Admin, None);
        let t = ticket(Uuid::new_v4(), None, Uuid::new_v4());
        assert!(can_edit(&admin, &t));
    }

    #[test]
    fn creator_assignee_and_department_members_can_edit() {
        let dept = Uuid::new_v4();
        let creator = profile(UserRole::User, None);
        let assignee = profile(UserRole::User, None);
        let colleague = profile(UserRole::User, Some(dept));

        let t = ticket(creator.id, Some(assignee.id), dept);
        assert!(can_edit(&creator, &t));
        assert!(can_edit(&assignee, &t));
        assert!(can_edit(&colleague, &t));
    }

    #[test]
    fn unrelated_users_cannot_edit() {
        let outsider = profile(UserRole::User, Some(Uuid::new_v4()));
        let t = ticket(Uuid::new_v4(), Some(Uuid::new_v4()), Uuid::new_v4());
        assert!(!can_edit(&outsider, &t));
        assert!(require_edit(&outsider, &t).is_err());
    }

    #[test]
    fn profile_without_department_gets_no_department_grant() {
        let actor = profile(UserRole::User, None);
        let t = ticket(Uuid::new_v4(), None, Uuid::new_v4());
        assert!(!can_edit(&actor, &t));
    }

    #[test]
    fn deletes_require_admin_even_for_authors() {
        let author = profile(UserRole::User, Some(Uuid::new_v4()));
        assert!(require_admin(&author).is_err());
        assert!(require_admin(&profile(UserRole::DepartmentManager, None)).is_err());
        assert!(require_admin(&profile(UserRole::Admin, None)).is_ok());
    }

    /// `can_edit` must equal the four-way disjunction exactly, no matter how
    /// roles, ids and departments line up. Small id pools force frequent
    /// collisions so every branch gets exercised.
    #[test]
    fn edit_permission_matches_the_disjunction() {
        let mut rng = rand::thread_rng();
        let roles = [UserRole::Admin, UserRole::DepartmentManager, UserRole::User];
        let people: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let departments: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();

        for _ in 0..1000 {
            let mut actor = profile(
                *roles.choose(&mut rng).unwrap(),
                if rng.gen_bool(0.5) {
                    Some(*departments.choose(&mut rng).unwrap())
                } else {
                    None
                },
            );
            actor.id = *people.choose(&mut rng).unwrap();

            let t = ticket(
                *people.choose(&mut rng).unwrap(),
                if rng.gen_bool(0.5) {
                    Some(*people.choose(&mut rng).unwrap())
                } else {
                    None
                },
                *departments.choose(&mut rng).unwrap(),
            );

            let expected = actor.role == UserRole::Admin
                || actor.id == t.created_by
                || t.assigned_to == Some(actor.id)
                || actor.department_id == Some(t.department_id);

            assert_eq!(can_edit(&actor, &t), expected);
        }
    }
}

pub mod attachments;
pub mod comments;
pub mod handlers;
pub mod history;
pub mod policy;
pub mod types;

use axum::{
    routing::{delete, get},
    Router,
};
use std::sync::Arc;

use crate::shared::state::AppState;

pub fn configure_tickets_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/tickets",
            get(handlers::list_tickets).post(handlers::create_ticket),
        )
        .route(
            "/api/tickets/:id",
            get(handlers::get_ticket)
                .patch(handlers::update_ticket)
                .delete(handlers::delete_ticket),
        )
        .route(
            "/api/tickets/:id/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route(
            "/api/tickets/:id/comments/:comment_id",
            delete(comments::delete_comment),
        )
        .route(
            "/api/tickets/:id/attachments",
            get(attachments::list_attachments).post(attachments::create_attachment),
        )
        .route(
            "/api/tickets/:id/attachments/:attachment_id",
            delete(attachments::delete_attachment),
        )
}

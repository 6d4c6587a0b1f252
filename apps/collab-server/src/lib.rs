//! Meme Collaboration HTTP Server
//! REST surface for collaborations, invitations, versions, forks and derived views

pub mod api;
pub mod config;
pub mod identity;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use collaboration::CollaborationService;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn app(service: Arc<CollaborationService>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        // Collections
        .route(
            "/collaborations",
            get(api::list_collaborations).post(api::create_collaboration),
        )
        .route("/collaborations/trending", get(api::trending))
        .route("/collaborations/templates", get(api::templates))
        .route("/collaborations/user/invites", get(api::my_invites))
        // Single collaboration
        .route("/collaborations/:id", get(api::get_collaboration))
        .route("/collaborations/:id/settings", put(api::update_settings))
        .route("/collaborations/:id/like", post(api::like))
        // Membership
        .route("/collaborations/:id/invite", post(api::invite))
        .route("/collaborations/:id/invites/accept", post(api::accept_invite))
        .route("/collaborations/:id/invites/decline", post(api::decline_invite))
        .route("/collaborations/:id/join", post(api::join))
        .route("/collaborations/:id/leave", post(api::leave))
        .route(
            "/collaborations/:id/requests/:user_id/approve",
            post(api::approve_join_request),
        )
        .route(
            "/collaborations/:id/requests/:user_id/reject",
            post(api::reject_join_request),
        )
        .route(
            "/collaborations/:id/collaborators/:user_id",
            delete(api::remove_collaborator),
        )
        .route(
            "/collaborations/:id/collaborators/:user_id/role",
            put(api::update_collaborator_role),
        )
        // History
        .route(
            "/collaborations/:id/versions",
            get(api::list_versions).post(api::add_version),
        )
        .route(
            "/collaborations/:id/comments",
            get(api::list_comments).post(api::add_comment),
        )
        .route("/collaborations/:id/fork", post(api::fork))
        .route("/collaborations/:id/forks", get(api::list_forks))
        // Derived views
        .route("/collaborations/:id/stats", get(api::stats))
        .route("/collaborations/:id/activity", get(api::activity))
        .route("/collaborations/:id/insights", get(api::insights))
        .layer(TraceLayer::new_for_http())
        // CORS for the presentation layer
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(service)
}

/// REST API endpoints for meme collaborations
/// Every response uses the same envelope: `{ success, data }` or `{ success, message }`
use axum::{
    async_trait,
    body::Bytes,
    extract::{
        rejection::JsonRejection, rejection::QueryRejection, FromRequest, FromRequestParts, Path,
        Request, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use collaboration::{
    ActivityEntry, Collaboration, CollaborationError, CollaborationId, CollaborationService,
    CollaborationSettings, CollaborationSummary, Collaborator, Comment, InviteSummary, Insights,
    JoinOutcome, ListQuery, NewCollaboration, NewVersion, Page, PendingInvite, Role, StatsView,
    UserId, Version,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use crate::identity::{AuthUser, ExpectedRevision, GuestName, MaybeUser};

type Service = State<Arc<CollaborationService>>;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    Collaboration(CollaborationError),
    Unauthenticated,
    BadRequest(String),
}

impl From<CollaborationError> for ApiError {
    fn from(e: CollaborationError) -> Self {
        ApiError::Collaboration(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Collaboration(e) => {
                let status = match &e {
                    CollaborationError::Validation(_) => StatusCode::BAD_REQUEST,
                    CollaborationError::Authorization(_) | CollaborationError::Forbidden(_) => {
                        StatusCode::FORBIDDEN
                    }
                    CollaborationError::NotFound(_) => StatusCode::NOT_FOUND,
                    CollaborationError::Conflict(_)
                    | CollaborationError::Capacity(_)
                    | CollaborationError::RevisionConflict { .. } => StatusCode::CONFLICT,
                    CollaborationError::Storage(_) => {
                        error!("Storage error: {}", e);
                        return (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            Json(json!({ "success": false, "message": "Internal error" })),
                        )
                            .into_response();
                    }
                };
                (status, e.to_string())
            }
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "Authentication required".to_string(),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}

/// Success envelope
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
    })
}

type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

/// JSON body whose rejections use the error envelope
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string whose rejections use the error envelope
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// JSON body that may be left out. An empty body yields `None`; anything else
/// must parse.
pub struct OptionalJson<T>(pub Option<T>);

#[async_trait]
impl<T, S> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(OptionalJson(None));
        }
        let Json(value) = Json::<T>::from_bytes(&bytes)?;
        Ok(OptionalJson(Some(value)))
    }
}

fn collab_id(raw: &str) -> Result<CollaborationId, ApiError> {
    Ok(CollaborationId::parse(raw)?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteRequest {
    pub user_id: String,
    pub role: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct JoinRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForkRequest {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

/// GET /health
pub async fn health() -> Json<Envelope<&'static str>> {
    ok("ok")
}

/// GET /collaborations - Public collaborations with search and pagination
pub async fn list_collaborations(
    State(service): Service,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Page<CollaborationSummary>> {
    Ok(ok(service.list(&query)?))
}

/// GET /collaborations/trending
pub async fn trending(
    State(service): Service,
    ApiQuery(query): ApiQuery<LimitQuery>,
) -> ApiResult<Vec<CollaborationSummary>> {
    Ok(ok(service.trending(query.limit)?))
}

/// GET /collaborations/templates
pub async fn templates(
    State(service): Service,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Page<CollaborationSummary>> {
    Ok(ok(service.templates(&query)?))
}

/// POST /collaborations - Create a collaboration owned by the caller
pub async fn create_collaboration(
    State(service): Service,
    AuthUser(actor): AuthUser,
    ApiJson(req): ApiJson<NewCollaboration>,
) -> Result<(StatusCode, Json<Envelope<Collaboration>>), ApiError> {
    let collab = service.create(&actor, req)?;
    Ok((StatusCode::CREATED, ok(collab)))
}

/// GET /collaborations/:id
pub async fn get_collaboration(
    State(service): Service,
    MaybeUser(principal): MaybeUser,
    Path(id): Path<String>,
) -> ApiResult<Collaboration> {
    Ok(ok(service.get(principal.as_ref(), &collab_id(&id)?)?))
}

/// POST /collaborations/:id/invite
pub async fn invite(
    State(service): Service,
    AuthUser(actor): AuthUser,
    ExpectedRevision(expected): ExpectedRevision,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<InviteRequest>,
) -> ApiResult<PendingInvite> {
    let role: Role = req.role.parse()?;
    let invite = service.invite(
        &actor,
        &collab_id(&id)?,
        UserId::new(req.user_id),
        role,
        req.message,
        expected,
    )?;
    Ok(ok(invite))
}

/// GET /collaborations/user/invites - Pending invitations for the caller
pub async fn my_invites(
    State(service): Service,
    AuthUser(actor): AuthUser,
) -> ApiResult<Vec<InviteSummary>> {
    Ok(ok(service.pending_invites(&actor)?))
}

/// POST /collaborations/:id/invites/accept
pub async fn accept_invite(
    State(service): Service,
    AuthUser(actor): AuthUser,
    ExpectedRevision(expected): ExpectedRevision,
    Path(id): Path<String>,
) -> ApiResult<Collaboration> {
    Ok(ok(service.accept_invite(&actor, &collab_id(&id)?, expected)?))
}

/// POST /collaborations/:id/invites/decline
pub async fn decline_invite(
    State(service): Service,
    AuthUser(actor): AuthUser,
    ExpectedRevision(expected): ExpectedRevision,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    service.decline_invite(&actor, &collab_id(&id)?, expected)?;
    Ok(ok(json!({ "declined": true })))
}

/// POST /collaborations/:id/join
pub async fn join(
    State(service): Service,
    AuthUser(actor): AuthUser,
    ExpectedRevision(expected): ExpectedRevision,
    Path(id): Path<String>,
    OptionalJson(body): OptionalJson<JoinRequest>,
) -> ApiResult<JoinOutcome> {
    let req = body.unwrap_or_default();
    Ok(ok(service.join(&actor, &collab_id(&id)?, req.message, expected)?))
}

/// POST /collaborations/:id/leave
pub async fn leave(
    State(service): Service,
    AuthUser(actor): AuthUser,
    ExpectedRevision(expected): ExpectedRevision,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    service.leave(&actor, &collab_id(&id)?, expected)?;
    Ok(ok(json!({ "left": true })))
}

/// POST /collaborations/:id/requests/:user_id/approve
pub async fn approve_join_request(
    State(service): Service,
    AuthUser(actor): AuthUser,
    ExpectedRevision(expected): ExpectedRevision,
    Path((id, user_id)): Path<(String, String)>,
) -> ApiResult<Collaborator> {
    let member =
        service.approve_join_request(&actor, &collab_id(&id)?, &UserId::new(user_id), expected)?;
    Ok(ok(member))
}

/// POST /collaborations/:id/requests/:user_id/reject
pub async fn reject_join_request(
    State(service): Service,
    AuthUser(actor): AuthUser,
    ExpectedRevision(expected): ExpectedRevision,
    Path((id, user_id)): Path<(String, String)>,
) -> ApiResult<serde_json::Value> {
    service.reject_join_request(&actor, &collab_id(&id)?, &UserId::new(user_id), expected)?;
    Ok(ok(json!({ "rejected": true })))
}

/// DELETE /collaborations/:id/collaborators/:user_id
pub async fn remove_collaborator(
    State(service): Service,
    AuthUser(actor): AuthUser,
    ExpectedRevision(expected): ExpectedRevision,
    Path((id, user_id)): Path<(String, String)>,
) -> ApiResult<serde_json::Value> {
    service.remove_collaborator(&actor, &collab_id(&id)?, &UserId::new(user_id), expected)?;
    Ok(ok(json!({ "removed": true })))
}

/// PUT /collaborations/:id/collaborators/:user_id/role
pub async fn update_collaborator_role(
    State(service): Service,
    AuthUser(actor): AuthUser,
    ExpectedRevision(expected): ExpectedRevision,
    Path((id, user_id)): Path<(String, String)>,
    ApiJson(req): ApiJson<RoleRequest>,
) -> ApiResult<Collaborator> {
    let role: Role = req.role.parse()?;
    let member = service.update_collaborator_role(
        &actor,
        &collab_id(&id)?,
        &UserId::new(user_id),
        role,
        expected,
    )?;
    Ok(ok(member))
}

/// PUT /collaborations/:id/settings
pub async fn update_settings(
    State(service): Service,
    AuthUser(actor): AuthUser,
    ExpectedRevision(expected): ExpectedRevision,
    Path(id): Path<String>,
    ApiJson(settings): ApiJson<CollaborationSettings>,
) -> ApiResult<CollaborationSettings> {
    Ok(ok(service.update_settings(&actor, &collab_id(&id)?, settings, expected)?))
}

/// GET /collaborations/:id/versions
pub async fn list_versions(
    State(service): Service,
    MaybeUser(principal): MaybeUser,
    Path(id): Path<String>,
) -> ApiResult<Vec<Version>> {
    Ok(ok(service.versions(principal.as_ref(), &collab_id(&id)?)?))
}

/// POST /collaborations/:id/versions
pub async fn add_version(
    State(service): Service,
    AuthUser(actor): AuthUser,
    ExpectedRevision(expected): ExpectedRevision,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<NewVersion>,
) -> Result<(StatusCode, Json<Envelope<Version>>), ApiError> {
    let version = service.add_version(&actor, &collab_id(&id)?, req, expected)?;
    Ok((StatusCode::CREATED, ok(version)))
}

/// GET /collaborations/:id/comments
pub async fn list_comments(
    State(service): Service,
    MaybeUser(principal): MaybeUser,
    Path(id): Path<String>,
) -> ApiResult<Vec<Comment>> {
    Ok(ok(service.comments(principal.as_ref(), &collab_id(&id)?)?))
}

/// POST /collaborations/:id/comments - Members, or guests when anonymous comments are on
pub async fn add_comment(
    State(service): Service,
    MaybeUser(principal): MaybeUser,
    GuestName(display_name): GuestName,
    ExpectedRevision(expected): ExpectedRevision,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<CommentRequest>,
) -> Result<(StatusCode, Json<Envelope<Comment>>), ApiError> {
    let comment = service.add_comment(
        principal.as_ref(),
        display_name.as_deref(),
        &collab_id(&id)?,
        &req.content,
        expected,
    )?;
    Ok((StatusCode::CREATED, ok(comment)))
}

/// POST /collaborations/:id/fork
pub async fn fork(
    State(service): Service,
    AuthUser(actor): AuthUser,
    ExpectedRevision(expected): ExpectedRevision,
    Path(id): Path<String>,
    OptionalJson(body): OptionalJson<ForkRequest>,
) -> Result<(StatusCode, Json<Envelope<Collaboration>>), ApiError> {
    let req = body.unwrap_or_default();
    let fork = service.fork(&actor, &collab_id(&id)?, req.title.as_deref(), expected)?;
    Ok((StatusCode::CREATED, ok(fork)))
}

/// GET /collaborations/:id/forks
pub async fn list_forks(
    State(service): Service,
    MaybeUser(principal): MaybeUser,
    Path(id): Path<String>,
) -> ApiResult<Vec<CollaborationSummary>> {
    Ok(ok(service.forks(principal.as_ref(), &collab_id(&id)?)?))
}

/// POST /collaborations/:id/like
pub async fn like(
    State(service): Service,
    AuthUser(actor): AuthUser,
    ExpectedRevision(expected): ExpectedRevision,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    let likes = service.like(&actor, &collab_id(&id)?, expected)?;
    Ok(ok(json!({ "likeCount": likes })))
}

/// GET /collaborations/:id/stats
pub async fn stats(
    State(service): Service,
    MaybeUser(principal): MaybeUser,
    Path(id): Path<String>,
) -> ApiResult<StatsView> {
    Ok(ok(service.stats(principal.as_ref(), &collab_id(&id)?)?))
}

/// GET /collaborations/:id/activity
pub async fn activity(
    State(service): Service,
    MaybeUser(principal): MaybeUser,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<LimitQuery>,
) -> ApiResult<Vec<ActivityEntry>> {
    Ok(ok(service.activity(principal.as_ref(), &collab_id(&id)?, query.limit)?))
}

/// GET /collaborations/:id/insights
pub async fn insights(
    State(service): Service,
    MaybeUser(principal): MaybeUser,
    Path(id): Path<String>,
) -> ApiResult<Insights> {
    Ok(ok(service.insights(principal.as_ref(), &collab_id(&id)?)?))
}

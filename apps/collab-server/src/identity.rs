/// Request identity extractors
/// The authentication gateway in front of this server resolves the caller and
/// forwards the principal in headers.
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::IF_MATCH, request::Parts, HeaderMap},
};
use collaboration::{CollaborationError, PlatformRole, Principal, UserId};

use crate::api::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const DISPLAY_NAME_HEADER: &str = "x-display-name";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, ApiError> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|s| Some(s.trim()).filter(|s| !s.is_empty()))
            .map_err(|_| ApiError::BadRequest(format!("invalid {} header", name))),
    }
}

fn principal_from_headers(headers: &HeaderMap) -> Result<Option<Principal>, ApiError> {
    let Some(user_id) = header_str(headers, USER_ID_HEADER)? else {
        return Ok(None);
    };
    let role = match header_str(headers, USER_ROLE_HEADER)? {
        Some(role) => role.parse::<PlatformRole>()?,
        None => PlatformRole::User,
    };
    Ok(Some(Principal {
        user_id: UserId::new(user_id),
        role,
    }))
}

/// Authenticated caller; rejects with 401 when absent
pub struct AuthUser(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        principal_from_headers(&parts.headers)?
            .map(AuthUser)
            .ok_or(ApiError::Unauthenticated)
    }
}

/// Caller that may be anonymous
pub struct MaybeUser(pub Option<Principal>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        principal_from_headers(&parts.headers).map(MaybeUser)
    }
}

/// Display name offered by an anonymous commenter
pub struct GuestName(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for GuestName
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(GuestName(
            header_str(&parts.headers, DISPLAY_NAME_HEADER)?.map(str::to_string),
        ))
    }
}

/// Revision the client last read, from `If-Match`
pub struct ExpectedRevision(pub Option<u64>);

#[async_trait]
impl<S> FromRequestParts<S> for ExpectedRevision
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw) = header_str(&parts.headers, IF_MATCH.as_str())? else {
            return Ok(ExpectedRevision(None));
        };
        raw.trim_matches('"')
            .parse::<u64>()
            .map(|r| ExpectedRevision(Some(r)))
            .map_err(|_| {
                ApiError::from(CollaborationError::Validation(
                    "If-Match must be a revision number".to_string(),
                ))
            })
    }
}

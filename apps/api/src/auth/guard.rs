use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tracing::debug;

use crate::auth::token::TokenError;
use crate::errors::AppError;
use crate::models::user::{Role, User, UserId};
use crate::state::AppState;

/// The acting account, resolved from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

/// Like `AuthUser`, but any missing or bad credential resolves to `None`.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Access token required".to_string()))?;
    let value = header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Malformed Authorization header".to_string()))?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Malformed Authorization header".to_string()))
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        let claims = state.tokens.verify(token).map_err(|e| {
            debug!("Rejected bearer token: {e}");
            match e {
                TokenError::Expired => AppError::Unauthorized("Token expired".to_string()),
                _ => AppError::Unauthorized("Invalid token".to_string()),
            }
        })?;

        let user = state
            .store
            .user_by_id(claims.sub)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid token - user not found".to_string()))?;

        if !user.is_active {
            return Err(AppError::Unauthorized("Account deactivated".to_string()));
        }

        Ok(AuthUser(user))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if !parts.headers.contains_key(AUTHORIZATION) {
            return Ok(MaybeUser(None));
        }
        let user = AuthUser::from_request_parts(parts, state).await.ok();
        Ok(MaybeUser(user.map(|AuthUser(user)| user)))
    }
}

impl AuthUser {
    pub fn id(&self) -> UserId {
        self.0.id
    }

    pub fn require_role(&self, role: Role) -> Result<(), AppError> {
        if self.0.role == role {
            Ok(())
        } else {
            Err(AppError::Forbidden("Insufficient permissions".to_string()))
        }
    }

    pub fn require_complete_profile(&self) -> Result<(), AppError> {
        let missing = self.0.missing_profile_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::IncompleteProfile(missing))
        }
    }

    /// 403 unless the caller is `owner`.
    pub fn require_owner(&self, owner: UserId, message: &str) -> Result<(), AppError> {
        if self.0.id == owner {
            Ok(())
        } else {
            Err(AppError::Forbidden(message.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;
    use crate::models::user::fixtures::{business, student};

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn message(err: AppError) -> String {
        match err {
            AppError::Unauthorized(msg) | AppError::Forbidden(msg) => msg,
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_bearer_token_variants() {
        assert_eq!(bearer_token(&parts_with(Some("Bearer abc"))).unwrap(), "abc");
        assert_eq!(
            message(bearer_token(&parts_with(None)).unwrap_err()),
            "Access token required"
        );
        assert_eq!(
            message(bearer_token(&parts_with(Some("Token abc"))).unwrap_err()),
            "Malformed Authorization header"
        );
        assert_eq!(
            message(bearer_token(&parts_with(Some("Bearer "))).unwrap_err()),
            "Malformed Authorization header"
        );
    }

    #[test]
    fn test_role_and_owner_checks() {
        let user = AuthUser(student("ana@example.com"));
        assert!(user.require_role(Role::Student).is_ok());
        assert!(matches!(user.require_role(Role::Business), Err(AppError::Forbidden(_))));
        assert!(user.require_owner(user.id(), "no").is_ok());
        assert!(matches!(
            user.require_owner(business("b@x.co").id, "no"),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_incomplete_profile_lists_fields() {
        let mut user = student("ana@example.com");
        user.student_info.age = None;
        match AuthUser(user).require_complete_profile() {
            Err(AppError::IncompleteProfile(missing)) => assert_eq!(missing, vec!["age"]),
            other => panic!("unexpected {other:?}"),
        }
    }
}

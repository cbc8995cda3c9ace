//! Authentication middleware
//!
//! Resolves the bearer token to the user row and its company membership on
//! every request.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use shared::CompanyRole;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::auth::decode_access_token;
use crate::AppState;

/// Authenticated user information resolved from the JWT subject
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub user_name: String,
    pub email: String,
    pub company_id: Option<Uuid>,
    pub role: Option<CompanyRole>,
}

impl AuthUser {
    /// The company the user acts for
    pub fn require_company(&self) -> AppResult<Uuid> {
        self.company_id
            .ok_or_else(|| AppError::Forbidden("user is not a member of any company".to_string()))
    }

    /// The company the user owns
    pub fn require_owner(&self) -> AppResult<Uuid> {
        let company_id = self.require_company()?;
        match self.role {
            Some(CompanyRole::Owner) => Ok(company_id),
            _ => Err(AppError::Forbidden(
                "only the company owner may perform this operation".to_string(),
            )),
        }
    }
}

#[derive(sqlx::FromRow)]
struct AuthUserRow {
    id: Uuid,
    user_name: String,
    email: String,
    company_id: Option<Uuid>,
    company_role: Option<String>,
}

/// Decode a bearer token and load the user it names
pub async fn resolve_user(state: &AppState, token: &str) -> AppResult<AuthUser> {
    let claims = decode_access_token(token, &state.config.jwt.secret)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;

    let row = sqlx::query_as::<_, AuthUserRow>(
        r#"
        SELECT id, user_name, email, company_id, company_role
        FROM users
        WHERE id = $1 AND email_verified = true
        "#,
    )
    .bind(user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::Unauthorized("user no longer exists".to_string()))?;

    Ok(AuthUser {
        user_id: row.id,
        user_name: row.user_name,
        email: row.email,
        company_id: row.company_id,
        role: row
            .company_role
            .as_deref()
            .and_then(CompanyRole::parse),
    })
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match bearer_token(&request) {
        Some(token) => token.to_string(),
        None => {
            return AppError::Unauthorized("Missing or invalid Authorization header".to_string())
                .into_response();
        }
    };

    match resolve_user(&state, &token).await {
        Ok(auth_user) => {
            request.extensions_mut().insert(auth_user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(company_id: Option<Uuid>, role: Option<CompanyRole>) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            user_name: "buyer_1".into(),
            email: "buyer@example.com".into(),
            company_id,
            role,
        }
    }

    #[test]
    fn require_company_without_membership_is_forbidden() {
        let err = user(None, None).require_company().unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn require_owner_checks_role() {
        let company = Uuid::new_v4();
        assert_eq!(
            user(Some(company), Some(CompanyRole::Owner))
                .require_owner()
                .unwrap(),
            company
        );
        assert!(user(Some(company), Some(CompanyRole::Member))
            .require_owner()
            .is_err());
    }

    #[test]
    fn bearer_prefix_is_required() {
        let request = Request::builder()
            .header(AUTHORIZATION, "Basic abc")
            .body(axum::body::Body::empty())
            .unwrap();
        assert!(bearer_token(&request).is_none());

        let request = Request::builder()
            .header(AUTHORIZATION, "Bearer abc")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&request), Some("abc"));
    }
}

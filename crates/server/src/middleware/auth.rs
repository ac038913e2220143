//! Bearer-token principal resolution and role gating

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use diacare_core::{Principal, UserType};

use crate::error::AppError;

pub const DOCTOR_ONLY: &[UserType] = &[UserType::Doctor];
pub const PATIENT_ONLY: &[UserType] = &[UserType::Patient];
pub const ANY_ROLE: &[UserType] = &[UserType::Doctor, UserType::Patient];

/// Token table state (tokens are issued outside this service)
#[derive(Clone)]
pub struct TokenAuth {
    tokens: Arc<HashMap<String, Principal>>,
    cookie: Option<String>,
}

impl TokenAuth {
    pub fn new(tokens: HashMap<String, Principal>, cookie: Option<String>) -> Self {
        Self {
            tokens: Arc::new(tokens),
            cookie,
        }
    }

    /// Resolve the principal behind the request's credentials
    pub fn resolve(&self, headers: &HeaderMap) -> Option<Principal> {
        let token = self
            .cookie_token(headers)
            .or_else(|| bearer_token(headers))?;
        self.tokens.get(token).cloned()
    }

    fn cookie_token<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        let name = self.cookie.as_deref()?;
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|cookies| cookies.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
            .filter(|value| !value.is_empty())
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authenticate the request and attach its [`Principal`]
pub async fn auth_middleware(mut request: Request<Body>, next: Next) -> Response {
    let principal = request
        .extensions()
        .get::<TokenAuth>()
        .and_then(|auth| auth.resolve(request.headers()));

    match principal {
        Some(principal) => {
            tracing::debug!(user_id = %principal.id, user_type = %principal.user_type, "Authenticated");
            request.extensions_mut().insert(principal.clone());
            let mut response = next.run(request).await;
            // Lets outer layers (audit) see who made the request
            response.extensions_mut().insert(principal);
            response
        }
        None => AppError::Unauthorized.into_response(),
    }
}

/// Reject principals whose role is not in `roles`
pub async fn require_role(
    State(roles): State<&'static [UserType]>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let verdict = match request.extensions().get::<Principal>() {
        None => Err(AppError::Unauthorized),
        Some(principal) if !principal.has_any_role(roles) => {
            tracing::info!(
                user_id = %principal.id,
                user_type = %principal.user_type,
                path = %request.uri().path(),
                "Role not permitted"
            );
            Err(AppError::Forbidden)
        }
        Some(_) => Ok(()),
    };

    match verdict {
        Ok(()) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}

/// Extractor for the principal attached by [`auth_middleware`]
pub struct CurrentUser(pub Principal);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(CurrentUser)
            .ok_or(AppError::Unauthorized)
    }
}

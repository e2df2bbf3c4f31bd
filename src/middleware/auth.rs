use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use moka::sync::Cache;
use serde_json::json;

use crate::api::auth::Claims;
use crate::config::Config;
use crate::db::models::subject::Subject;
use crate::utils::api_response::ApiResponse;

/// ✅ **Subject Catalog Cache Using `moka`**
///
/// Request validation hits the subject catalog on every create; the catalog
/// changes rarely, so lookups are cached with a TTL.
pub type SubjectCache = Arc<Cache<i32, Subject>>;

/// ✅ **Initialize the `moka` Cache**
pub fn create_subject_cache() -> SubjectCache {
    Arc::new(
        Cache::builder()
            .time_to_live(Duration::from_secs(600)) // ✅ TTL = 10 minutes
            .build(),
    )
}

/// The closed set of marketplace roles an authenticated actor can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRole {
    Student,
    Tutor,
    Admin,
}

impl ActorRole {
    /// Unknown role strings demote to the least-privileged role.
    pub fn from_str_or_student(raw: &str) -> Self {
        match raw {
            "admin" => ActorRole::Admin,
            "tutor" => ActorRole::Tutor,
            _ => ActorRole::Student,
        }
    }

    pub fn is_admin(self) -> bool {
        self == ActorRole::Admin
    }

    pub fn is_tutor(self) -> bool {
        self == ActorRole::Tutor
    }

    pub fn is_student(self) -> bool {
        self == ActorRole::Student
    }
}

/// ✅ **JWT Middleware** (Handles Token Authentication)
pub async fn jwt_middleware(mut req: Request<Body>, next: Next) -> Result<Response, Response> {
    // Step 1: Extract Authorization header
    let auth_header = req.headers().get("Authorization").ok_or_else(|| {
        tracing::error!("Missing Authorization header");
        ApiResponse::<()>::error(StatusCode::UNAUTHORIZED, "Missing Authorization header", None)
            .into_response()
    })?;

    // Step 2: Convert header to string
    let token_str = auth_header.to_str().map_err(|_| {
        tracing::error!("Invalid Authorization header format");
        ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Invalid Authorization header format",
            None,
        )
        .into_response()
    })?;

    // Step 3: Strip "Bearer " prefix
    let token = token_str.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::error!("Invalid token format (missing 'Bearer ' prefix)");
        ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Invalid token format (missing 'Bearer ' prefix)",
            None,
        )
        .into_response()
    })?;

    // Step 4: Decode the JWT token
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(Config::get().jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::error!("JWT decoding failed: {:?}", e);
        ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Invalid token",
            Some(json!({ "error": e.to_string() })),
        )
        .into_response()
    })?;

    // Step 5: Insert claims into request extensions
    req.extensions_mut().insert(token_data.claims);

    // Step 6: Proceed to the next middleware
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing_demotes_unknown_to_student() {
        assert_eq!(ActorRole::from_str_or_student("admin"), ActorRole::Admin);
        assert_eq!(ActorRole::from_str_or_student("tutor"), ActorRole::Tutor);
        assert_eq!(ActorRole::from_str_or_student("student"), ActorRole::Student);
        assert_eq!(ActorRole::from_str_or_student("manager"), ActorRole::Student);
        assert_eq!(ActorRole::from_str_or_student(""), ActorRole::Student);
    }

    #[test]
    fn role_predicates_are_exclusive() {
        assert!(ActorRole::Admin.is_admin());
        assert!(!ActorRole::Admin.is_tutor());
        assert!(ActorRole::Tutor.is_tutor());
        assert!(!ActorRole::Tutor.is_student());
        assert!(ActorRole::Student.is_student());
    }
}

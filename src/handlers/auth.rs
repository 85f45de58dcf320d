//! Bearer-token extractors for the control plane.
//!
//! Two tiers: write operations need the admin token, read operations accept
//! either token. A tier whose token is not configured is open; deployments
//! that sit behind their own gateway run that way. The operator identity
//! comes from the X-Actor header and lands in the action log.

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use std::env;

use crate::models::error::ControlError;
use crate::services::action_log::RequestMeta;

pub const ENV_ADMIN_TOKEN: &str = "SYNC_ADMIN_TOKEN";
pub const ENV_READ_TOKEN: &str = "SYNC_READ_TOKEN";

const ACTOR_HEADER: &str = "x-actor";
const DEFAULT_ACTOR: &str = "operator";

/// Caller authorized for write operations (trigger, stop, config).
#[derive(Debug)]
pub struct AdminUser {
    pub actor: String,
    pub meta: RequestMeta,
}

/// Caller authorized for read operations (status, progress, actions).
pub struct ReadUser;

fn bearer(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn header_string(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

fn configured_token(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.is_empty())
}

fn request_meta(parts: &Parts) -> RequestMeta {
    RequestMeta {
        ip_address: header_string(parts, "x-forwarded-for")
            .map(|v| v.split(',').next().unwrap_or("").trim().to_string())
            .filter(|v| !v.is_empty()),
        user_agent: header_string(parts, "user-agent"),
        path: Some(parts.uri.path().to_string()),
        method: Some(parts.method.to_string()),
    }
}

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = ControlError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(expected) = configured_token(ENV_ADMIN_TOKEN) {
            match bearer(parts) {
                Some(token) if token == expected => {}
                _ => return Err(ControlError::unauthorized("admin token required")),
            }
        }
        let actor = header_string(parts, ACTOR_HEADER).unwrap_or_else(|| DEFAULT_ACTOR.to_string());
        Ok(AdminUser {
            actor,
            meta: request_meta(parts),
        })
    }
}

impl<S> FromRequestParts<S> for ReadUser
where
    S: Send + Sync,
{
    type Rejection = ControlError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let read = configured_token(ENV_READ_TOKEN);
        let admin = configured_token(ENV_ADMIN_TOKEN);
        if read.is_none() && admin.is_none() {
            return Ok(ReadUser);
        }
        match bearer(parts) {
            Some(token)
                if read.as_deref() == Some(token) || admin.as_deref() == Some(token) =>
            {
                Ok(ReadUser)
            }
            _ => Err(ControlError::unauthorized("read token required")),
        }
    }
}

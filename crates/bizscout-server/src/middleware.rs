//! Request plumbing shared by every route: request ids, bearer auth and a
//! per-caller request budget.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::ApiError;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const API_KEYS_VAR: &str = "BIZSCOUT_API_KEYS";
const ANONYMOUS_CALLER: &str = "anonymous";

/// Request id carried as a request extension and echoed on the response.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Bearer tokens accepted by the protected routes.
#[derive(Debug, Clone)]
pub struct AuthState {
    api_keys: Arc<HashSet<String>>,
    pub enabled: bool,
}

impl AuthState {
    /// Reads comma-separated tokens from `BIZSCOUT_API_KEYS`.
    ///
    /// # Errors
    ///
    /// Fails outside development when no token is configured.
    pub fn from_env(is_development: bool) -> anyhow::Result<Self> {
        let raw = std::env::var(API_KEYS_VAR).unwrap_or_default();
        Self::from_keys(&raw, is_development)
    }

    /// An empty list disables auth in development and is an error elsewhere.
    ///
    /// # Errors
    ///
    /// Fails outside development when `raw` holds no token.
    pub fn from_keys(raw: &str, is_development: bool) -> anyhow::Result<Self> {
        let api_keys: HashSet<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(ToOwned::to_owned)
            .collect();

        match (api_keys.is_empty(), is_development) {
            (true, true) => {
                tracing::warn!("{API_KEYS_VAR} is empty; api auth disabled for development");
                Ok(Self {
                    api_keys: Arc::new(api_keys),
                    enabled: false,
                })
            }
            (true, false) => anyhow::bail!("{API_KEYS_VAR} must list at least one bearer token"),
            (false, _) => Ok(Self {
                api_keys: Arc::new(api_keys),
                enabled: true,
            }),
        }
    }

    fn allows(&self, token: &str) -> bool {
        self.api_keys.contains(token)
    }
}

#[derive(Debug, Clone, Copy)]
struct CallerWindow {
    started_at: Instant,
    count: usize,
}

/// Fixed-window budget tracked separately for each bearer token.
///
/// Unauthenticated callers (auth disabled) share one budget.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    callers: Arc<Mutex<HashMap<String, CallerWindow>>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            callers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Count one request for `caller`; `false` once its window is spent.
    async fn admit(&self, caller: &str, now: Instant) -> bool {
        let mut callers = self.callers.lock().await;
        let window = callers.entry(caller.to_string()).or_insert(CallerWindow {
            started_at: now,
            count: 0,
        });
        if now.duration_since(window.started_at) >= self.window {
            *window = CallerWindow {
                started_at: now,
                count: 0,
            };
        }
        if window.count >= self.max_requests {
            return false;
        }
        window.count += 1;
        true
    }
}

fn request_id_of(req: &Request) -> String {
    req.extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default()
}

/// Adopt the caller's `x-request-id` or mint a v4 UUID, then echo it back.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));
    let mut res = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        res.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    res
}

pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    req: Request,
    next: Next,
) -> Response {
    if !auth.enabled {
        return next.run(req).await;
    }
    match bearer_token(req.headers().get(AUTHORIZATION)) {
        Some(token) if auth.allows(token) => next.run(req).await,
        _ => {
            let request_id = request_id_of(&req);
            tracing::debug!(%request_id, "api: rejected request without a valid bearer token");
            ApiError::new(request_id, "unauthorized", "missing or invalid bearer token")
                .into_response()
        }
    }
}

pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let caller = bearer_token(req.headers().get(AUTHORIZATION))
        .unwrap_or(ANONYMOUS_CALLER)
        .to_string();
    if rate_limit.admit(&caller, Instant::now()).await {
        return next.run(req).await;
    }
    let request_id = request_id_of(&req);
    tracing::warn!(%request_id, "api: request budget exhausted");
    ApiError::new(request_id, "rate_limited", "rate limit exceeded").into_response()
}

fn bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_reads_the_authorization_value() {
        let header = HeaderValue::from_static("Bearer scout-token");
        assert_eq!(bearer_token(Some(&header)), Some("scout-token"));
    }

    #[test]
    fn bearer_token_ignores_other_schemes_and_blanks() {
        let basic = HeaderValue::from_static("Basic abc123");
        assert_eq!(bearer_token(Some(&basic)), None);
        let blank = HeaderValue::from_static("Bearer   ");
        assert_eq!(bearer_token(Some(&blank)), None);
        assert_eq!(bearer_token(None), None);
    }

    #[test]
    fn auth_is_disabled_without_keys_in_development() {
        let state = AuthState::from_keys(" , ", true).expect("dev should allow missing keys");
        assert!(!state.enabled);
    }

    #[test]
    fn auth_requires_keys_outside_development() {
        assert!(AuthState::from_keys("", false).is_err());
    }

    #[test]
    fn auth_accepts_listed_keys_only() {
        let state = AuthState::from_keys("alpha, beta", false).expect("keys");
        assert!(state.enabled);
        assert!(state.allows("alpha"));
        assert!(state.allows("beta"));
        assert!(!state.allows("gamma"));
    }

    #[tokio::test]
    async fn each_caller_has_its_own_budget() {
        let limiter = RateLimitState::new(2, Duration::from_secs(60));
        let now = Instant::now();

        assert!(limiter.admit("alpha", now).await);
        assert!(limiter.admit("alpha", now).await);
        assert!(!limiter.admit("alpha", now).await);
        assert!(limiter.admit("beta", now).await);
    }

    #[tokio::test]
    async fn budget_resets_after_the_window() {
        let limiter = RateLimitState::new(1, Duration::from_secs(60));
        let start = Instant::now();

        assert!(limiter.admit("alpha", start).await);
        assert!(!limiter.admit("alpha", start + Duration::from_secs(59)).await);
        assert!(limiter.admit("alpha", start + Duration::from_secs(60)).await);
    }
}

use crate::{cache::CachedLink, error::StoreError, models::ClickEvent, AppState};
use axum::{
    extract::{ConnectInfo, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::{net::SocketAddr, sync::Arc};

/// GET /:code
///
/// 1. Check the in-memory cache for the short code (fast path — no DB hit).
/// 2. On a cache miss, fall back to the database.
/// 3. Offer a click event to the click queue. A full queue drops the click;
///    the redirect never waits on analytics.
/// 4. Return a 302 redirect to the original URL.
pub async fn redirect(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    // ── 1. Resolve URL ─────────────────────────────────────────────────────
    let link = match state.cache.get(&code) {
        Some(link) => link,
        None => match state.store.find_by_code(&code).await {
            Ok(link) => {
                // Backfill the cache for next time
                state.cache.set(&link);
                CachedLink::from(&link)
            }
            Err(StoreError::NotFound) => {
                return (StatusCode::NOT_FOUND, "Short link not found").into_response();
            }
            Err(e) => {
                tracing::error!("DB error looking up short code '{}': {}", code, e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response();
            }
        },
    };

    // ── 2. Queue the click ─────────────────────────────────────────────────
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let event = ClickEvent {
        link_id: link.id,
        clicked_at: Utc::now().naive_utc(),
        user_agent,
        ip_address: extract_ip(&headers, addr),
    };

    if !state.clicks.enqueue(event) {
        tracing::warn!(link_id = link.id, "Click queue full, click dropped for '{}'", code);
    }

    // ── 3. Redirect ────────────────────────────────────────────────────────
    (StatusCode::FOUND, [(header::LOCATION, link.original_url)]).into_response()
}

// ── Helpers ────────────────────────────────────────────────────────────────

/// Determine the real client IP, preferring common proxy headers.
fn extract_ip(headers: &HeaderMap, addr: SocketAddr) -> Option<String> {
    // X-Forwarded-For can be a comma-separated list; take the first entry.
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(ip) = xff.split(',').next().map(str::trim) {
            if !ip.is_empty() {
                return Some(ip.to_owned());
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        if !real_ip.is_empty() {
            return Some(real_ip.to_owned());
        }
    }

    Some(addr.ip().to_string())
}

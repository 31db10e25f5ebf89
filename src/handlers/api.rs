use crate::{error::StoreError, AppState};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

// ── Request / response bodies ──────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateLinkRequest {
    long_url: String,
}

#[derive(Serialize)]
struct CreatedLink {
    short_code: String,
    long_url: String,
    full_short_url: String,
}

#[derive(Serialize)]
struct LinkStats {
    short_code: String,
    long_url: String,
    total_clicks: i64,
}

// ── Handlers ───────────────────────────────────────────────────────────────

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// POST /api/v1/links
pub async fn create_link(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateLinkRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            tracing::debug!("Rejected create request: {}", rejection.body_text());
            return error_response(StatusCode::BAD_REQUEST, "Invalid request");
        }
    };

    let url = req.long_url.trim();
    if let Err(msg) = validate_destination(url) {
        return error_response(StatusCode::BAD_REQUEST, msg);
    }

    match state.allocator.create_link(url).await {
        Ok(link) => {
            // Update the cache immediately
            state.cache.set(&link);
            let body = CreatedLink {
                full_short_url: state.config.short_url(&link.short_code),
                short_code: link.short_code,
                long_url: link.original_url,
            };
            (StatusCode::CREATED, Json(body)).into_response()
        }
        Err(e) => {
            tracing::error!("Failed to create link for {}: {}", url, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create short link")
        }
    }
}

/// GET /api/v1/links/:code/stats
pub async fn link_stats(State(state): State<Arc<AppState>>, Path(code): Path<String>) -> Response {
    let link = match state.store.find_by_code(&code).await {
        Ok(link) => link,
        Err(StoreError::NotFound) => {
            return error_response(StatusCode::NOT_FOUND, "Short link not found");
        }
        Err(e) => {
            tracing::error!("DB error looking up short code '{}': {}", code, e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error");
        }
    };

    match state.store.count_clicks(link.id).await {
        Ok(total_clicks) => Json(LinkStats {
            short_code: link.short_code,
            long_url: link.original_url,
            total_clicks,
        })
        .into_response(),
        Err(e) => {
            tracing::error!("Failed to count clicks for link {}: {}", link.id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────

/// Basic URL validation shared by the API and the `create` command.
pub fn validate_destination(url: &str) -> Result<(), &'static str> {
    if url.is_empty() {
        return Err("URL must not be empty.");
    }
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        None => Err("URL must start with http:// or https://"),
        Some(host) if host.is_empty() || host.starts_with('/') => Err("URL must include a host."),
        Some(host) if host.chars().any(char::is_whitespace) => {
            Err("URL must not contain whitespace.")
        }
        Some(_) => Ok(()),
    }
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    (status, Json(json!({ "error": msg }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        handlers::tests::{body_json, test_app},
        store::LinkStore,
    };
    use axum::{
        body::Body,
        http::{header, Request},
    };
    use tower::ServiceExt;

    fn post_link(url: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/links")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "long_url": url }).to_string()))
            .unwrap()
    }

    #[test]
    fn destination_validation() {
        assert!(validate_destination("https://example.com").is_ok());
        assert!(validate_destination("http://example.com/a?b=c").is_ok());
        assert!(validate_destination("").is_err());
        assert!(validate_destination("ftp://example.com").is_err());
        assert!(validate_destination("example.com").is_err());
        assert!(validate_destination("https://").is_err());
        assert!(validate_destination("https://exa mple.com").is_err());
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (app, _) = test_app(10).await;
        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn create_returns_short_url() {
        let (app, _) = test_app(10).await;
        let resp = app
            .oneshot(post_link("https://example.com/some/long/path"))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::CREATED);
        let body = body_json(resp).await;
        let code = body["short_code"].as_str().unwrap();
        assert_eq!(code.len(), 6);
        assert_eq!(body["long_url"], "https://example.com/some/long/path");
        assert_eq!(
            body["full_short_url"],
            format!("http://short.test/{code}").as_str()
        );
    }

    #[tokio::test]
    async fn create_rejects_invalid_url() {
        let (app, _) = test_app(10).await;
        let resp = app.oneshot(post_link("not a url")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(resp).await["error"].is_string());
    }

    #[tokio::test]
    async fn malformed_create_body_is_a_json_bad_request() {
        let (app, harness) = test_app(10).await;

        let bodies = [
            json!({ "url": "https://example.com" }).to_string(),
            json!({ "long_url": 5 }).to_string(),
            "not json".to_owned(),
        ];
        for body in bodies {
            let req = Request::builder()
                .method("POST")
                .uri("/api/v1/links")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.clone()))
                .unwrap();
            let resp = app.clone().oneshot(req).await.unwrap();

            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body: {body}");
            assert_eq!(
                resp.headers()[header::CONTENT_TYPE],
                "application/json",
                "body: {body}"
            );
            assert_eq!(
                body_json(resp).await,
                json!({ "error": "Invalid request" }),
                "body: {body}"
            );
        }

        assert!(harness.store.list_links().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stats_for_unknown_code_is_not_found() {
        let (app, _) = test_app(10).await;
        let resp = app
            .oneshot(
                Request::get("/api/v1/links/zzzzzz/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn stats_count_persisted_clicks() {
        let (app, harness) = test_app(10).await;
        let resp = app
            .clone()
            .oneshot(post_link("https://example.com"))
            .await
            .unwrap();
        let code = body_json(resp).await["short_code"]
            .as_str()
            .unwrap()
            .to_owned();

        harness.record_clicks(&code, 3).await;

        let resp = app
            .oneshot(
                Request::get(format!("/api/v1/links/{code}/stats"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_json(resp).await,
            json!({
                "short_code": code,
                "long_url": "https://example.com",
                "total_clicks": 3,
            })
        );
    }
}

use crate::store::Store;
use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware,
    routing::{get, patch, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use url::Url;

pub mod error;
pub mod handlers;
mod openapi;
pub mod response;

pub use error::ApiError;
pub use handlers::auth::{AuthConfig, AuthState, Principal};
pub use openapi::openapi;
pub use response::ApiResponse;

use handlers::{
    auth::{account, refresh, require_auth, session},
    comments, health, tweets, videos,
};

/// Build the application router with every route and layer.
///
/// `frontend_origin` is the single origin allowed to make credentialed
/// cross-origin requests.
pub fn router(store: Arc<dyn Store>, auth: Arc<AuthState>, frontend_origin: HeaderValue) -> Router {
    let protected = Router::new()
        .route("/api/v1/users/logout", post(session::logout))
        .route("/api/v1/users/change-password", post(account::change_password))
        .route("/api/v1/users/current-user", get(account::current_user))
        .route("/api/v1/tweets", post(tweets::create_tweet))
        .route("/api/v1/tweets/user/:user_id", get(tweets::get_user_tweets))
        .route(
            "/api/v1/tweets/:tweet_id",
            patch(tweets::update_tweet).delete(tweets::delete_tweet),
        )
        .route("/api/v1/comments/:video_id", post(comments::add_comment))
        .route(
            "/api/v1/comments/c/:comment_id",
            patch(comments::update_comment).delete(comments::delete_comment),
        )
        .route("/api/v1/videos", post(videos::publish_video))
        .route(
            "/api/v1/videos/:video_id",
            get(videos::get_video)
                .patch(videos::update_video)
                .delete(videos::delete_video),
        )
        .route(
            "/api/v1/videos/toggle/publish/:video_id",
            patch(videos::toggle_publish_status),
        )
        // Runs only for matched routes, so unknown paths stay 404.
        .route_layer(middleware::from_fn(require_auth));

    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_origin(AllowOrigin::exact(frontend_origin))
        .allow_credentials(true);

    Router::new()
        .route("/health", get(health::health).options(health::health))
        .route("/api/v1/users/register", post(account::register))
        .route("/api/v1/users/login", post(session::login))
        .route(
            "/api/v1/users/refresh-token",
            post(refresh::refresh_access_token),
        )
        .merge(protected)
        .merge(openapi::swagger_ui())
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(auth))
                .layer(Extension(store)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to bind or serve
pub async fn new(
    port: u16,
    store: Arc<dyn Store>,
    auth: Arc<AuthState>,
    frontend_base_url: &str,
) -> Result<()> {
    let app = router(store, auth, frontend_origin(frontend_base_url)?);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

/// Reduce a frontend URL to its origin (`scheme://host[:port]`) for CORS.
///
/// # Errors
/// Returns an error if the URL does not parse or has no host.
pub fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontend_origin_strips_path() -> Result<()> {
        let origin = frontend_origin("https://app.vidtube.dev/some/path?x=1")?;
        assert_eq!(origin, "https://app.vidtube.dev");
        Ok(())
    }

    #[test]
    fn frontend_origin_keeps_explicit_port() -> Result<()> {
        let origin = frontend_origin("http://localhost:3000/")?;
        assert_eq!(origin, "http://localhost:3000");
        Ok(())
    }

    #[test]
    fn frontend_origin_rejects_garbage() {
        assert!(frontend_origin("not a url").is_err());
        assert!(frontend_origin("mailto:someone@example.com").is_err());
    }
}

mod handlers;
pub mod middleware;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::db::Database;
pub use middleware::{RateLimiter, SecurityConfig};

pub fn create_router(db: Database, security: SecurityConfig) -> Router {
    let mut auth = Router::new()
        .route("/auth/signup", post(handlers::signup))
        .route("/auth/login", post(handlers::login));
    if let Some(limiter) = security.auth_rate_limiter.clone() {
        auth = auth.route_layer(from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    let authenticated = Router::new()
        .route("/auth/me", get(handlers::me))
        .route(
            "/progress",
            get(handlers::get_progress).post(handlers::record_step),
        )
        .route_layer(from_fn_with_state(db.clone(), middleware::require_user));

    let api = Router::new()
        // Catalogue
        .route("/labs", get(handlers::list_labs))
        .route("/labs/{id}", get(handlers::get_lab))
        .route("/leaderboard", get(handlers::leaderboard))
        .merge(auth)
        .merge(authenticated);

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&security))
        .with_state(db)
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    match &security.cors_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match origin.parse() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        }
        None => CorsLayer::permissive(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app(security: SecurityConfig) -> Router {
        let db = Database::open_memory().unwrap();
        db.migrate().unwrap();
        create_router(db, security)
    }

    async fn allowed_origin(app: Router, origin: &str) -> Option<String> {
        let request = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, origin)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn configured_origins_are_the_only_ones_allowed() {
        let security = SecurityConfig {
            cors_origins: Some(vec!["https://labs.uni.edu".to_string()]),
            auth_rate_limiter: None,
        };

        assert_eq!(
            allowed_origin(app(security.clone()), "https://labs.uni.edu").await,
            Some("https://labs.uni.edu".to_string())
        );
        assert_eq!(
            allowed_origin(app(security), "https://evil.example").await,
            None
        );
    }

    #[tokio::test]
    async fn no_configured_origins_means_permissive() {
        assert_eq!(
            allowed_origin(app(SecurityConfig::disabled()), "https://anywhere.io").await,
            Some("*".to_string())
        );
    }
}

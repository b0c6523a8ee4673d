use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{AuthError, PasswordHashing, TokenIssuer};
use crate::config::AppConfig;
use crate::database::models::{Book, Chapter, Verse};
use crate::database::{AdminRepository, Database, Repository};
use crate::handlers::{protected, public};
use crate::middleware::{jwt_auth_middleware, validate_admin_middleware};
use crate::services::AuthService;

/// Shared handles every handler and middleware reaches through `State`
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub auth: AuthService,
    pub books: Repository<Book>,
    pub chapters: Repository<Chapter>,
    pub verses: Repository<Verse>,
    pub config: Arc<AppConfig>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(db: Database, config: AppConfig) -> Result<Self, AuthError> {
        let tokens = TokenIssuer::from_config(&config.security)?;
        let hashing = PasswordHashing::from_config(&config.security)?;
        let auth = AuthService::new(AdminRepository::new(&db), tokens, hashing);

        Ok(Self {
            books: Repository::new(&db),
            chapters: Repository::new(&db),
            verses: Repository::new(&db),
            auth,
            db,
            config: Arc::new(config),
            started_at: Instant::now(),
        })
    }
}

pub fn router(state: AppState) -> Router {
    let config = state.config.clone();

    let api = public_routes().merge(protected_routes(&state));

    let base_path = normalize_base_path(&config.server.base_path);
    let router = Router::new().route("/health", get(public::health::health_get));
    let router = if base_path.is_empty() {
        router.merge(api)
    } else {
        router.nest(&base_path, api)
    };

    router
        .fallback(endpoint_not_found)
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes))
        .layer(cors_layer(&config.security.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn public_routes() -> Router<AppState> {
    use public::{auth, bible};

    Router::new()
        .route("/auth/signup", post(auth::signup_post))
        .route("/auth/login", post(auth::login_post))
        .route("/auth/refresh", post(auth::refresh_post))
        .route("/bible/bible", get(bible::bible_get))
        .route("/bible/update", get(bible::update_get))
}

fn protected_routes(state: &AppState) -> Router<AppState> {
    use protected::{book, chapter, verse};

    Router::new()
        .route("/book", get(book::list).post(book::create))
        .route("/book/lookup", get(book::lookup))
        .route("/book/:id", get(book::get).put(book::update).delete(book::delete))
        .route("/chapter", get(chapter::list).post(chapter::create))
        .route("/chapter/lookup", get(chapter::lookup))
        .route(
            "/chapter/:id",
            get(chapter::get).put(chapter::update).delete(chapter::delete),
        )
        .route("/verse", get(verse::list).post(verse::create))
        .route("/verse/lookup", get(verse::lookup))
        .route("/verse/:id", get(verse::get).put(verse::update).delete(verse::delete))
        // Layers run bottom-up: the token is verified before the admin lookup
        .route_layer(from_fn_with_state(state.clone(), validate_admin_middleware))
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware))
}

/// "/api/" -> "/api", "api" -> "/api", "/" or "" -> "" (mount at root)
pub fn normalize_base_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

async fn endpoint_not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "message": "Endpoint not found"
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_path_is_normalized() {
        assert_eq!(normalize_base_path("/api"), "/api");
        assert_eq!(normalize_base_path("/api/"), "/api");
        assert_eq!(normalize_base_path("v1"), "/v1");
        assert_eq!(normalize_base_path("/"), "");
        assert_eq!(normalize_base_path(""), "");
    }
}

use std::path::PathBuf;
use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::BlogConfig;
use crate::handler::BlogDB;
use crate::handlers;
use crate::templates::Templates;

/// Everything a handler can reach. Cloned per request; all fields are shared.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<BlogDB>,
    pub templates: Arc<Templates>,
    pub config: Arc<BlogConfig>,
}

impl AppState {
    pub fn new(db: BlogDB, templates: Templates, config: BlogConfig) -> Self {
        Self {
            db: Arc::new(db),
            templates: Arc::new(templates),
            config: Arc::new(config),
        }
    }

    pub fn media_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.media_dir)
    }
}

pub fn router(state: AppState) -> Router {
    let media = ServeDir::new(state.media_dir());
    let statics = ServeDir::new(state.config.static_dir());
    let max_upload = state.config.max_upload_length;

    Router::new()
        .route("/", get(handlers::get_index_handler))
        .route("/posts/create/", get(handlers::create_post_form).post(handlers::create_post))
        .route("/posts/:post_id/", get(handlers::get_post_handler))
        .route(
            "/posts/:post_id/edit/",
            get(handlers::edit_post_form).post(handlers::update_post),
        )
        .route(
            "/posts/:post_id/delete/",
            get(handlers::delete_post).post(handlers::delete_post),
        )
        .route(
            "/posts/:post_id/comment/",
            get(handlers::add_comment).post(handlers::add_comment),
        )
        .route(
            "/posts/:post_id/comment/:comment_id/edit/",
            get(handlers::edit_comment_form).post(handlers::update_comment),
        )
        .route(
            "/posts/:post_id/comment/:comment_id/delete/",
            get(handlers::delete_comment_confirm).post(handlers::delete_comment),
        )
        .route("/category/:category_slug/", get(handlers::get_category_handler))
        .route("/profile/edit/", get(handlers::edit_profile_form).post(handlers::update_profile))
        .route("/profile/:username/", get(handlers::get_profile_handler))
        .route("/register/", get(handlers::registration_form).post(handlers::register))
        .route("/auth/login/", get(handlers::login_form).post(handlers::login))
        .route("/auth/logout/", get(handlers::logout).post(handlers::logout))
        .nest_service("/media", media)
        .nest_service("/static", statics)
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

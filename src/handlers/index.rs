use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use http::StatusCode;

use crate::app::AppState;
use crate::auth::Viewer;
use crate::handler::WithDB;
use crate::models::Post;
use crate::post_util::{self, now_utc};
use crate::view_models::Post as PostView;

use super::{render, templates_for, PageQuery};

pub async fn get_index_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let offset = state.config.current_timezone_offset;
    let mut conn = state.db.dbconn()?;

    let page = post_util::list_posts(
        &mut conn,
        Post::all,
        viewer.user(),
        now_utc(),
        query.page.as_deref(),
        state.config.posts_per_page,
    )
    .map_err(|e| state.db.handle_errors(e))?
    .map(|item| PostView::from_list_item(item, &offset));

    render(
        &templates_for(&state, viewer.user()).add_context("page_obj", &page),
        "blog/index.html",
    )
}

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use diesel::prelude::*;
use http::StatusCode;
use log::info;

use crate::app::AppState;
use crate::auth::Viewer;
use crate::handler::WithDB;
use crate::models::{Category, Post};
use crate::post_util::{self, now_utc};
use crate::view_models::{CategoryRef, Post as PostView};

use super::{render, templates_for, PageQuery};

pub async fn get_category_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(category_slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    info!("category listing for {:?}", category_slug);
    let offset = state.config.current_timezone_offset;
    let mut conn = state.db.dbconn()?;

    let category = Category::published_by_slug(&category_slug)
        .select(Category::as_select())
        .first(&mut conn)
        .map_err(|e| state.db.handle_errors(e))?;

    let category_id = category.id;
    let page = post_util::list_posts(
        &mut conn,
        || Post::by_category(category_id),
        viewer.user(),
        now_utc(),
        query.page.as_deref(),
        state.config.posts_per_page,
    )
    .map_err(|e| state.db.handle_errors(e))?
    .map(|item| PostView::from_list_item(item, &offset));

    render(
        &templates_for(&state, viewer.user())
            .add_context("category", &CategoryRef::from(&category))
            .add_context("page_obj", &page),
        "blog/category.html",
    )
}

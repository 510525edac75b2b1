use axum::response::Html;
use diesel::prelude::*;
use http::StatusCode;
use log::error;
use serde::Deserialize;

use crate::app::AppState;
use crate::errors::TemplateError;
use crate::models::{Category, Location, User};
use crate::schema::{categories, locations};
use crate::templates::Templates;
use crate::view_models::User as UserView;

mod accounts;
mod category;
mod comments;
mod index;
mod posts;
mod profile;


pub use accounts::{login, login_form, logout, register, registration_form};
pub use category::get_category_handler;
pub use comments::{
    add_comment, delete_comment, delete_comment_confirm, edit_comment_form, update_comment,
};
pub use index::get_index_handler;
pub use posts::{
    create_post, create_post_form, delete_post, edit_post_form, get_post_handler, update_post,
};
pub use profile::{edit_profile_form, get_profile_handler, update_profile};

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// Shared templates with the requesting user filled in.
fn templates_for(state: &AppState, viewer: Option<&User>) -> Templates {
    let offset = state.config.current_timezone_offset;
    state
        .templates
        .add_context("user", &viewer.map(|u| UserView::new_from(u, &offset)))
}

fn render(templates: &Templates, template: &str) -> Result<Html<String>, StatusCode> {
    templates.render(template).map(Html).map_err(|e| {
        error!("{:?}", e);
        StatusCode::from(TemplateError)
    })
}

/// Every category and location, for the post form's select boxes.
fn load_choices(conn: &mut SqliteConnection) -> QueryResult<(Vec<Category>, Vec<Location>)> {
    let categories = categories::table
        .order(categories::title.asc())
        .select(Category::as_select())
        .load(conn)?;
    let locations = locations::table
        .order(locations::name.asc())
        .select(Location::as_select())
        .load(conn)?;
    Ok((categories, locations))
}

fn profile_url(user: &User) -> String {
    format!("/profile/{}/", user.username)
}

fn post_url(post_id: i32) -> String {
    format!("/posts/{}/", post_id)
}

fn is_unique_violation(e: &diesel::result::Error) -> bool {
    matches!(
        e,
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _
        )
    )
}

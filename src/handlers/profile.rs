use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use diesel::prelude::*;
use http::StatusCode;
use log::info;

use crate::app::AppState;
use crate::auth::{AuthUser, Viewer};
use crate::forms::{FormState, UserUpdateForm};
use crate::handler::WithDB;
use crate::models::{Post, User, UserProfileChanges};
use crate::post_util::{self, now_utc};
use crate::schema::users;
use crate::view_models::{Post as PostView, User as UserView};

use super::{is_unique_violation, profile_url, render, templates_for, PageQuery};

pub async fn get_profile_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let offset = state.config.current_timezone_offset;
    let mut conn = state.db.dbconn()?;

    let author: User = User::by_username(&username)
        .select(User::as_select())
        .first(&mut conn)
        .map_err(|e| state.db.handle_errors(e))?;

    let author_id = author.id;
    let page = post_util::list_posts(
        &mut conn,
        || Post::by_author(author_id),
        viewer.user(),
        now_utc(),
        query.page.as_deref(),
        state.config.posts_per_page,
    )
    .map_err(|e| state.db.handle_errors(e))?
    .map(|item| PostView::from_list_item(item, &offset));

    render(
        &templates_for(&state, viewer.user())
            .add_context("profile", &UserView::new_from(&author, &offset))
            .add_context("page_obj", &page),
        "blog/profile.html",
    )
}

fn render_profile_form(state: &AppState, user: &User, form: &FormState) -> Result<Response, StatusCode> {
    render(
        &templates_for(state, Some(user)).add_context("form", form),
        "blog/user.html",
    )
    .map(IntoResponse::into_response)
}

pub async fn edit_profile_form(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Response, StatusCode> {
    render_profile_form(&state, &user, &UserUpdateForm::instance(&user))
}

pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    form: Option<Form<UserUpdateForm>>,
) -> Result<Response, StatusCode> {
    let form = form.map(|Form(f)| f).unwrap_or_default();
    let mut conn = state.db.dbconn()?;

    let taken: i64 = users::table
        .filter(users::username.eq(form.username.trim()))
        .filter(users::id.ne(user.id))
        .count()
        .get_result(&mut conn)
        .map_err(|e| state.db.handle_errors(e))?;

    let valid = match form.validate(taken > 0) {
        Ok(valid) => valid,
        Err(errors) => {
            return render_profile_form(&state, &user, &form.state().with_errors(&errors));
        }
    };

    let result = diesel::update(users::table.find(user.id))
        .set(&UserProfileChanges {
            username: &valid.username,
            email: &valid.email,
            first_name: &valid.first_name,
            last_name: &valid.last_name,
        })
        .execute(&mut conn);
    match result {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            let mut errors = crate::forms::FormErrors::new();
            errors.add("username", "A user with that username already exists.");
            return render_profile_form(&state, &user, &form.state().with_errors(&errors));
        }
        Err(e) => return Err(state.db.handle_errors(e).into()),
    }
    info!("{} updated their profile", valid.username);

    let updated = User {
        username: valid.username,
        ..user
    };
    Ok(Redirect::to(&profile_url(&updated)).into_response())
}

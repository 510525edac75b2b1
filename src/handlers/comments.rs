use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use diesel::prelude::*;
use http::StatusCode;
use log::{debug, info, warn};

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::forms::{CommentForm, FormState};
use crate::handler::WithDB;
use crate::models::{Comment, NewComment, Post, User};
use crate::post_util::now_utc;
use crate::schema::{comments, posts};
use crate::view_models::CommentView;

use super::{post_url, render, templates_for};

pub async fn add_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(post_id): Path<i32>,
    form: Option<Form<CommentForm>>,
) -> Result<Response, StatusCode> {
    let mut conn = state.db.dbconn()?;
    let post: Post = posts::table
        .find(post_id)
        .select(Post::as_select())
        .first(&mut conn)
        .map_err(|e| state.db.handle_errors(e))?;

    let form = form.map(|Form(f)| f).unwrap_or_default();
    match form.validate() {
        Ok(valid) => {
            diesel::insert_into(comments::table)
                .values(&NewComment {
                    text: &valid.text,
                    post_id: post.id,
                    author_id: user.id,
                    created_at: now_utc(),
                })
                .execute(&mut conn)
                .map_err(|e| state.db.handle_errors(e))?;
            info!("{} commented on post {}", user.username, post.id);
        }
        Err(errors) => {
            debug!("dropping invalid comment on post {}: {:?}", post.id, errors);
        }
    }

    Ok(Redirect::to(&post_url(post.id)).into_response())
}

/// Loads the comment addressed by the path and checks it belongs to `user`.
fn owned_comment(
    state: &AppState,
    user: &User,
    post_id: i32,
    comment_id: i32,
) -> Result<(Comment, Post), StatusCode> {
    let mut conn = state.db.dbconn()?;
    let comment: Comment = comments::table
        .filter(comments::id.eq(comment_id))
        .filter(comments::post_id.eq(post_id))
        .select(Comment::as_select())
        .first(&mut conn)
        .map_err(|e| state.db.handle_errors(e))?;

    if comment.author_id != user.id {
        warn!(
            "{} tried to change comment {} they do not own",
            user.username, comment_id
        );
        return Err(StatusCode::FORBIDDEN);
    }

    let post: Post = posts::table
        .find(post_id)
        .select(Post::as_select())
        .first(&mut conn)
        .map_err(|e| state.db.handle_errors(e))?;
    Ok((comment, post))
}

fn render_comment_page(
    state: &AppState,
    user: &User,
    comment: Comment,
    post: &Post,
    form: &FormState,
    deleting: bool,
) -> Result<Response, StatusCode> {
    let offset = state.config.current_timezone_offset;
    let comment = CommentView::new_from(comment, user, &offset);
    render(
        &templates_for(state, Some(user))
            .add_context("comment", &comment)
            .add_context("post_id", &post.id)
            .add_context("post_title", &post.title)
            .add_context("form", form)
            .add_context("deleting", &deleting),
        "blog/comment.html",
    )
    .map(IntoResponse::into_response)
}

pub async fn edit_comment_form(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((post_id, comment_id)): Path<(i32, i32)>,
) -> Result<Response, StatusCode> {
    let (comment, post) = owned_comment(&state, &user, post_id, comment_id)?;
    let form = CommentForm {
        text: comment.text.clone(),
    }
    .state();
    render_comment_page(&state, &user, comment, &post, &form, false)
}

pub async fn update_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((post_id, comment_id)): Path<(i32, i32)>,
    form: Option<Form<CommentForm>>,
) -> Result<Response, StatusCode> {
    let (comment, post) = owned_comment(&state, &user, post_id, comment_id)?;
    let form = form.map(|Form(f)| f).unwrap_or_default();

    let valid = match form.validate() {
        Ok(valid) => valid,
        Err(errors) => {
            let state_with_errors = form.state().with_errors(&errors);
            return render_comment_page(&state, &user, comment, &post, &state_with_errors, false);
        }
    };

    let mut conn = state.db.dbconn()?;
    diesel::update(comments::table.find(comment.id))
        .set(comments::text.eq(&valid.text))
        .execute(&mut conn)
        .map_err(|e| state.db.handle_errors(e))?;

    Ok(Redirect::to(&post_url(post_id)).into_response())
}

pub async fn delete_comment_confirm(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((post_id, comment_id)): Path<(i32, i32)>,
) -> Result<Response, StatusCode> {
    let (comment, post) = owned_comment(&state, &user, post_id, comment_id)?;
    let form = CommentForm {
        text: comment.text.clone(),
    }
    .state();
    render_comment_page(&state, &user, comment, &post, &form, true)
}

pub async fn delete_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((post_id, comment_id)): Path<(i32, i32)>,
) -> Result<Response, StatusCode> {
    let (comment, _post) = owned_comment(&state, &user, post_id, comment_id)?;

    let mut conn = state.db.dbconn()?;
    diesel::delete(comments::table.find(comment.id))
        .execute(&mut conn)
        .map_err(|e| state.db.handle_errors(e))?;
    info!("{} deleted comment {}", user.username, comment.id);

    Ok(Redirect::to(&post_url(post_id)).into_response())
}

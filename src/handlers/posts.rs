use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    response::{IntoResponse, Redirect, Response},
};
use diesel::prelude::*;
use http::StatusCode;
use log::{info, warn};

use crate::app::AppState;
use crate::auth::{AuthUser, Viewer};
use crate::forms::{CommentForm, FormErrors, FormState, ImageChange, PostForm, ValidPost};
use crate::handler::WithDB;
use crate::media_util;
use crate::models::{Category, Location, NewPost, Post, PostChanges, User};
use crate::post_util::{self, now_utc};
use crate::schema::{categories, locations, posts, users};
use crate::view_models::{CategoryRef, CommentView, LocationRef, Post as PostView};

use super::{load_choices, post_url, profile_url, render, templates_for};

fn find_post(state: &AppState, conn: &mut SqliteConnection, post_id: i32) -> Result<Post, StatusCode> {
    posts::table
        .find(post_id)
        .select(Post::as_select())
        .first(conn)
        .map_err(|e| state.db.handle_errors(e).into())
}

fn find_category(conn: &mut SqliteConnection, id: Option<i32>) -> QueryResult<Option<Category>> {
    match id {
        Some(id) => categories::table
            .find(id)
            .select(Category::as_select())
            .first(conn)
            .optional(),
        None => Ok(None),
    }
}

fn find_location(conn: &mut SqliteConnection, id: Option<i32>) -> QueryResult<Option<Location>> {
    match id {
        Some(id) => locations::table
            .find(id)
            .select(Location::as_select())
            .first(conn)
            .optional(),
        None => Ok(None),
    }
}

pub async fn get_post_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(post_id): Path<i32>,
) -> Result<impl IntoResponse, StatusCode> {
    let offset = state.config.current_timezone_offset;
    let mut conn = state.db.dbconn()?;

    let post = find_post(&state, &mut conn, post_id)?;
    let category = find_category(&mut conn, post.category_id).map_err(|e| state.db.handle_errors(e))?;
    if !post.is_visible_to(category.as_ref(), viewer.user(), now_utc()) {
        info!("post {} is not visible to {:?}", post_id, viewer.user().map(|u| u.id));
        return Err(StatusCode::NOT_FOUND);
    }

    let location = find_location(&mut conn, post.location_id).map_err(|e| state.db.handle_errors(e))?;
    let author: User = users::table
        .find(post.author_id)
        .select(User::as_select())
        .first(&mut conn)
        .map_err(|e| state.db.handle_errors(e))?;
    let comments: Vec<CommentView> = post_util::post_comments(&mut conn, post.id)
        .map_err(|e| state.db.handle_errors(e))?
        .into_iter()
        .map(|(comment, author)| CommentView::new_from(comment, &author, &offset))
        .collect();

    let post_view = PostView::new_from(
        post,
        &author,
        category.as_ref(),
        location.as_ref(),
        comments.len() as i64,
        &offset,
    );
    render(
        &templates_for(&state, viewer.user())
            .add_context("post", &post_view)
            .add_context("comments", &comments)
            .add_context("form", &CommentForm::blank()),
        "blog/detail.html",
    )
}

fn render_post_form(
    state: &AppState,
    user: &User,
    form: &FormState,
    post: Option<&PostView>,
    categories: &[Category],
    locations: &[Location],
) -> Result<Response, StatusCode> {
    let categories: Vec<CategoryRef> = categories.iter().map(CategoryRef::from).collect();
    let locations: Vec<LocationRef> = locations.iter().map(LocationRef::from).collect();
    render(
        &templates_for(state, Some(user))
            .add_context("form", form)
            .add_context("post", &post)
            .add_context("categories", &categories)
            .add_context("locations", &locations),
        "blog/create.html",
    )
    .map(IntoResponse::into_response)
}

pub async fn create_post_form(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Response, StatusCode> {
    let mut conn = state.db.dbconn()?;
    let (categories, locations) = load_choices(&mut conn).map_err(|e| state.db.handle_errors(e))?;
    let form = PostForm::initial(&now_utc(), &state.config.current_timezone_offset);
    render_post_form(&state, &user, &form, None, &categories, &locations)
}

/// Stores a newly uploaded image, returning the value the `image` column
/// should hold afterwards.
async fn apply_image_change(
    state: &AppState,
    change: &ImageChange,
    current: Option<&str>,
) -> Result<Option<String>, StatusCode> {
    Ok(match change {
        ImageChange::Keep => current.map(str::to_string),
        ImageChange::Clear => None,
        ImageChange::Replace { image, format } => {
            Some(media_util::store_image(&state.media_dir(), image, format).await?)
        }
    })
}

fn validate_post_form(
    state: &AppState,
    form: PostForm,
) -> Result<(Result<ValidPost, FormErrors>, FormState, Vec<Category>, Vec<Location>), StatusCode> {
    let mut conn = state.db.dbconn()?;
    let (categories, locations) = load_choices(&mut conn).map_err(|e| state.db.handle_errors(e))?;
    let submitted = form.state();
    let result = form.validate(&categories, &locations, &state.config.current_timezone_offset);
    Ok((result, submitted, categories, locations))
}

pub async fn create_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, StatusCode> {
    let multipart = match multipart {
        Ok(m) => m,
        Err(rejection) => return Ok(rejection.into_response()),
    };
    let form = PostForm::from_multipart(multipart).await?;

    let (result, submitted, categories, locations) = validate_post_form(&state, form)?;
    let valid = match result {
        Ok(valid) => valid,
        Err(errors) => {
            let form = submitted.with_errors(&errors);
            return render_post_form(&state, &user, &form, None, &categories, &locations);
        }
    };

    let image = apply_image_change(&state, &valid.image, None).await?;
    let mut conn = state.db.dbconn()?;
    diesel::insert_into(posts::table)
        .values(&NewPost {
            title: &valid.title,
            text: &valid.text,
            pub_date: valid.pub_date,
            author_id: user.id,
            location_id: valid.location_id,
            category_id: valid.category_id,
            is_published: valid.is_published,
            created_at: now_utc(),
            image: image.as_deref(),
        })
        .execute(&mut conn)
        .map_err(|e| state.db.handle_errors(e))?;
    info!("{} created post {:?}", user.username, valid.title);

    Ok(Redirect::to(&profile_url(&user)).into_response())
}

fn post_view_for_form(
    state: &AppState,
    conn: &mut SqliteConnection,
    post: Post,
    author: &User,
) -> Result<PostView, StatusCode> {
    let category = find_category(conn, post.category_id).map_err(|e| state.db.handle_errors(e))?;
    let location = find_location(conn, post.location_id).map_err(|e| state.db.handle_errors(e))?;
    Ok(PostView::new_from(
        post,
        author,
        category.as_ref(),
        location.as_ref(),
        0,
        &state.config.current_timezone_offset,
    ))
}

pub async fn edit_post_form(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(post_id): Path<i32>,
) -> Result<Response, StatusCode> {
    let mut conn = state.db.dbconn()?;
    let post = find_post(&state, &mut conn, post_id)?;
    if post.author_id != user.id {
        return Ok(Redirect::to(&post_url(post_id)).into_response());
    }

    let (categories, locations) = load_choices(&mut conn).map_err(|e| state.db.handle_errors(e))?;
    let form = PostForm::instance(&post, &state.config.current_timezone_offset);
    let view = post_view_for_form(&state, &mut conn, post, &user)?;
    render_post_form(&state, &user, &form, Some(&view), &categories, &locations)
}

pub async fn update_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(post_id): Path<i32>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, StatusCode> {
    let post = {
        let mut conn = state.db.dbconn()?;
        find_post(&state, &mut conn, post_id)?
    };
    if post.author_id != user.id {
        warn!("{} tried to edit post {} they do not own", user.username, post_id);
        return Ok(Redirect::to(&post_url(post_id)).into_response());
    }

    let multipart = match multipart {
        Ok(m) => m,
        Err(rejection) => return Ok(rejection.into_response()),
    };
    let form = PostForm::from_multipart(multipart).await?;

    let (result, submitted, categories, locations) = validate_post_form(&state, form)?;
    let valid = match result {
        Ok(valid) => valid,
        Err(errors) => {
            let form = submitted.with_errors(&errors);
            let mut conn = state.db.dbconn()?;
            let view = post_view_for_form(&state, &mut conn, post, &user)?;
            return render_post_form(&state, &user, &form, Some(&view), &categories, &locations);
        }
    };

    let image = apply_image_change(&state, &valid.image, post.image.as_deref()).await?;
    let mut conn = state.db.dbconn()?;
    diesel::update(posts::table.find(post_id))
        .set(&PostChanges {
            title: &valid.title,
            text: &valid.text,
            pub_date: valid.pub_date,
            location_id: valid.location_id,
            category_id: valid.category_id,
            is_published: valid.is_published,
            image: image.as_deref(),
        })
        .execute(&mut conn)
        .map_err(|e| state.db.handle_errors(e))?;

    if let Some(old) = post.image.as_deref() {
        if image.as_deref() != Some(old) {
            media_util::remove_image(&state.media_dir(), old).await;
        }
    }

    Ok(Redirect::to(&post_url(post_id)).into_response())
}

pub async fn delete_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(post_id): Path<i32>,
) -> Result<Response, StatusCode> {
    let post = {
        let mut conn = state.db.dbconn()?;
        find_post(&state, &mut conn, post_id)?
    };
    if post.author_id != user.id {
        warn!("{} tried to delete post {} they do not own", user.username, post_id);
        return Err(StatusCode::FORBIDDEN);
    }

    state
        .db
        .run_txn(|conn| post_util::delete_post_cascade(conn, post_id))?;
    info!("{} deleted post {}", user.username, post_id);

    if let Some(image) = post.image.as_deref() {
        media_util::remove_image(&state.media_dir(), image).await;
    }

    Ok(Redirect::to(&profile_url(&user)).into_response())
}

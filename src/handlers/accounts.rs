use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use diesel::prelude::*;
use http::StatusCode;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::{self, Viewer};
use crate::forms::{FormErrors, FormState, LoginForm, UserCreationForm, NON_FIELD};
use crate::handler::WithDB;
use crate::models::{NewUser, User};
use crate::post_util::now_utc;
use crate::schema::users;

use super::{is_unique_violation, render, templates_for};

const BAD_LOGIN: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

fn render_registration(state: &AppState, viewer: Option<&User>, form: &FormState) -> Result<Response, StatusCode> {
    render(
        &templates_for(state, viewer).add_context("form", form),
        "registration/registration_form.html",
    )
    .map(IntoResponse::into_response)
}

pub async fn registration_form(
    State(state): State<AppState>,
    viewer: Viewer,
) -> Result<Response, StatusCode> {
    render_registration(&state, viewer.user(), &UserCreationForm::blank())
}

pub async fn register(
    State(state): State<AppState>,
    viewer: Viewer,
    form: Option<Form<UserCreationForm>>,
) -> Result<Response, StatusCode> {
    let form = form.map(|Form(f)| f).unwrap_or_default();

    let taken = {
        let mut conn = state.db.dbconn()?;
        User::by_username(form.username.trim())
            .count()
            .get_result::<i64>(&mut conn)
            .map_err(|e| state.db.handle_errors(e))?
            > 0
    };
    let valid = match form.validate(taken) {
        Ok(valid) => valid,
        Err(errors) => {
            return render_registration(&state, viewer.user(), &form.state().with_errors(&errors));
        }
    };

    let password_hash = auth::hash_password_blocking(valid.password.clone()).await?;
    let mut conn = state.db.dbconn()?;
    let result = diesel::insert_into(users::table)
        .values(&NewUser {
            username: &valid.username,
            email: &valid.email,
            first_name: &valid.first_name,
            last_name: &valid.last_name,
            password_hash: &password_hash,
            date_joined: now_utc(),
        })
        .execute(&mut conn);
    match result {
        Ok(_) => info!("registered new user {}", valid.username),
        Err(e) if is_unique_violation(&e) => {
            let mut errors = FormErrors::new();
            errors.add("username", "A user with that username already exists.");
            return render_registration(&state, viewer.user(), &form.state().with_errors(&errors));
        }
        Err(e) => return Err(state.db.handle_errors(e).into()),
    }

    Ok(Redirect::to(crate::LOGIN_URL).into_response())
}

fn render_login(
    state: &AppState,
    viewer: Option<&User>,
    form: &FormState,
    next: Option<&str>,
) -> Result<Response, StatusCode> {
    render(
        &templates_for(state, viewer)
            .add_context("form", form)
            .add_context("next", &next.unwrap_or_default()),
        "registration/login.html",
    )
    .map(IntoResponse::into_response)
}

pub async fn login_form(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<NextQuery>,
) -> Result<Response, StatusCode> {
    render_login(&state, viewer.user(), &LoginForm::blank(), query.next.as_deref())
}

pub async fn login(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<NextQuery>,
    form: Option<Form<LoginForm>>,
) -> Result<Response, StatusCode> {
    let form = form.map(|Form(f)| f).unwrap_or_default();
    let next = form.next.clone().or(query.next);

    let (username, password) = match form.validate() {
        Ok(credentials) => credentials,
        Err(errors) => {
            return render_login(&state, viewer.user(), &form.state().with_errors(&errors), next.as_deref());
        }
    };

    let user: Option<User> = {
        let mut conn = state.db.dbconn()?;
        User::by_username(&username)
            .select(User::as_select())
            .first(&mut conn)
            .optional()
            .map_err(|e| state.db.handle_errors(e))?
    };
    let verified = match &user {
        Some(user) => auth::verify_password_blocking(password, user.password_hash.clone()).await,
        None => false,
    };
    let user = match user {
        Some(user) if verified => user,
        _ => {
            warn!("failed login for {:?}", username);
            let mut errors = FormErrors::new();
            errors.add(NON_FIELD, BAD_LOGIN);
            return render_login(&state, viewer.user(), &form.state().with_errors(&errors), next.as_deref());
        }
    };

    let mut conn = state.db.dbconn()?;
    let max_age = state.config.session_max_age_secs;
    let token = auth::create_session(&mut conn, user.id, now_utc(), max_age)
        .map_err(|e| state.db.handle_errors(e))?;
    info!("{} logged in", user.username);

    let target = next
        .filter(|n| auth::is_safe_redirect(n))
        .unwrap_or_else(|| crate::LOGIN_REDIRECT_URL.to_string());
    Ok((
        [(header::SET_COOKIE, auth::session_cookie(&token, max_age))],
        Redirect::to(&target),
    )
        .into_response())
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, StatusCode> {
    if let Some(token) = auth::session_token(&headers) {
        let mut conn = state.db.dbconn()?;
        auth::delete_session(&mut conn, &token).map_err(|e| state.db.handle_errors(e))?;
    }

    Ok((
        [(header::SET_COOKIE, auth::expired_session_cookie())],
        Redirect::to(crate::LOGIN_REDIRECT_URL),
    )
        .into_response())
}

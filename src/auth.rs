use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
};
use chrono::{Duration, NaiveDateTime};
use diesel::prelude::*;
use log::{debug, error};

use crate::app::AppState;
use crate::errors::PasswordHashError;
use crate::handler::WithDB;
use crate::models::{NewSession, User};
use crate::post_util::now_utc;
use crate::schema::{sessions, users};

pub fn hash_password(password: &str) -> Result<String, PasswordHashError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("password hashing failed: {:?}", e);
            PasswordHashError
        })
}

/// Malformed or unusable stored hashes never verify.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Argon2 is deliberately slow; keep it off the async workers.
pub async fn hash_password_blocking(password: String) -> Result<String, PasswordHashError> {
    tokio_rayon::spawn(move || hash_password(&password)).await
}

pub async fn verify_password_blocking(password: String, hash: String) -> bool {
    tokio_rayon::spawn(move || verify_password(&password, &hash)).await
}

pub fn create_session(
    conn: &mut SqliteConnection,
    user: i32,
    now: NaiveDateTime,
    max_age_secs: i64,
) -> QueryResult<String> {
    let token = uuid::Uuid::new_v4().simple().to_string();
    diesel::insert_into(sessions::table)
        .values(&NewSession {
            token: &token,
            user_id: user,
            expires_at: now + Duration::seconds(max_age_secs),
            created_at: now,
        })
        .execute(conn)?;
    Ok(token)
}

/// The user behind a live session token, if any.
pub fn session_user(
    conn: &mut SqliteConnection,
    token: &str,
    now: NaiveDateTime,
) -> QueryResult<Option<User>> {
    sessions::table
        .inner_join(users::table)
        .filter(sessions::token.eq(token))
        .filter(sessions::expires_at.gt(now))
        .select(User::as_select())
        .first(conn)
        .optional()
}

pub fn delete_session(conn: &mut SqliteConnection, token: &str) -> QueryResult<usize> {
    diesel::delete(sessions::table.filter(sessions::token.eq(token))).execute(conn)
}

pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, value)| *name == crate::SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

pub fn session_cookie(token: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        crate::SESSION_COOKIE,
        token,
        max_age_secs
    )
}

pub fn expired_session_cookie() -> String {
    format!(
        "{}=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0",
        crate::SESSION_COOKIE
    )
}

/// Only same-site absolute paths are followed after login. The target also
/// has to be usable as a `Location` header as is.
pub fn is_safe_redirect(next: &str) -> bool {
    next.starts_with('/')
        && !next.starts_with("//")
        && !next.contains('\\')
        && !next.chars().any(char::is_control)
        && HeaderValue::from_str(next).is_ok()
}

pub fn login_redirect(uri: &Uri) -> Redirect {
    let next = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    Redirect::to(&format!(
        "{}?next={}",
        crate::LOGIN_URL,
        urlencoding::encode(next)
    ))
}

/// Whoever is making the request, if they are logged in.
#[derive(Clone, Debug)]
pub struct Viewer(pub Option<User>);

impl Viewer {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Viewer {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = match session_token(&parts.headers) {
            Some(token) => token,
            None => return Ok(Viewer(None)),
        };

        let mut conn = state.db.dbconn()?;
        let user = session_user(&mut conn, &token, now_utc())
            .map_err(|e| state.db.handle_errors(e))?;
        debug!(
            "session resolved to {:?}",
            user.as_ref().map(|u| u.username.as_str())
        );
        Ok(Viewer(user))
    }
}

/// A logged-in user. Anonymous requests are sent to the login page.
#[derive(Clone, Debug)]
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Viewer(user) = Viewer::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        match user {
            Some(user) => Ok(AuthUser(user)),
            None => Err(login_redirect(&parts.uri).into_response()),
        }
    }
}

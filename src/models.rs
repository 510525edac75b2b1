use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sqlite::Sqlite;
use serde::Serialize;

use crate::schema::{categories, comments, locations, posts, sessions, users};

#[derive(Clone, Debug, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(Sqlite))]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub date_joined: NaiveDateTime,
}

impl User {
    pub fn by_username(name: &str) -> users::BoxedQuery<'_, Sqlite> {
        users::table.filter(users::username.eq(name)).into_boxed()
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub password_hash: &'a str,
    pub date_joined: NaiveDateTime,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = users)]
pub struct UserProfileChanges<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = sessions)]
pub struct NewSession<'a> {
    pub token: &'a str,
    pub user_id: i32,
    pub expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

#[derive(Clone, Debug, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = categories)]
#[diesel(check_for_backend(Sqlite))]
pub struct Category {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub slug: String,
    pub is_published: bool,
    pub created_at: NaiveDateTime,
}

impl Category {
    /// Categories whose posts may be shown to everyone.
    pub fn published_by_slug(
        category_slug: &str,
    ) -> categories::BoxedQuery<'_, Sqlite> {
        categories::table
            .filter(categories::slug.eq(category_slug))
            .filter(categories::is_published.eq(true))
            .into_boxed()
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = categories)]
pub struct NewCategory<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub slug: &'a str,
    pub is_published: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Clone, Debug, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = locations)]
#[diesel(check_for_backend(Sqlite))]
pub struct Location {
    pub id: i32,
    pub name: String,
    pub is_published: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = locations)]
pub struct NewLocation<'a> {
    pub name: &'a str,
    pub is_published: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Clone, Debug, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = posts)]
#[diesel(check_for_backend(Sqlite))]
pub struct Post {
    pub id: i32,
    pub title: String,
    pub text: String,
    pub pub_date: NaiveDateTime,
    pub author_id: i32,
    pub location_id: Option<i32>,
    pub category_id: Option<i32>,
    pub is_published: bool,
    pub created_at: NaiveDateTime,
    pub image: Option<String>,
}

impl Post {
    pub fn all() -> posts::BoxedQuery<'static, Sqlite> {
        posts::table.into_boxed()
    }

    pub fn by_category(category: i32) -> posts::BoxedQuery<'static, Sqlite> {
        posts::table
            .filter(posts::category_id.eq(category))
            .into_boxed()
    }

    pub fn by_author(author: i32) -> posts::BoxedQuery<'static, Sqlite> {
        posts::table
            .filter(posts::author_id.eq(author))
            .into_boxed()
    }

    /// Published, in a published category, and not scheduled for the future.
    pub fn is_visible(&self, category: Option<&Category>, now: NaiveDateTime) -> bool {
        self.is_published
            && category.map_or(false, |c| c.is_published)
            && self.pub_date <= now
    }

    pub fn is_visible_to(
        &self,
        category: Option<&Category>,
        viewer: Option<&User>,
        now: NaiveDateTime,
    ) -> bool {
        self.is_visible(category, now) || viewer.map_or(false, |u| u.id == self.author_id)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = posts)]
pub struct NewPost<'a> {
    pub title: &'a str,
    pub text: &'a str,
    pub pub_date: NaiveDateTime,
    pub author_id: i32,
    pub location_id: Option<i32>,
    pub category_id: Option<i32>,
    pub is_published: bool,
    pub created_at: NaiveDateTime,
    pub image: Option<&'a str>,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = posts)]
#[diesel(treat_none_as_null = true)]
pub struct PostChanges<'a> {
    pub title: &'a str,
    pub text: &'a str,
    pub pub_date: NaiveDateTime,
    pub location_id: Option<i32>,
    pub category_id: Option<i32>,
    pub is_published: bool,
    pub image: Option<&'a str>,
}

#[derive(Clone, Debug, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = comments)]
#[diesel(check_for_backend(Sqlite))]
pub struct Comment {
    pub id: i32,
    pub text: String,
    pub post_id: i32,
    pub author_id: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = comments)]
pub struct NewComment<'a> {
    pub text: &'a str,
    pub post_id: i32,
    pub author_id: i32,
    pub created_at: NaiveDateTime,
}

#[cfg(test)]
mod test {
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    use super::{Category, Post, User};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap()
    }

    fn category(is_published: bool) -> Category {
        Category {
            id: 1,
            title: "Travel".into(),
            description: "".into(),
            slug: "travel".into(),
            is_published,
            created_at: now(),
        }
    }

    fn post(is_published: bool, pub_date: NaiveDateTime) -> Post {
        Post {
            id: 1,
            title: "title".into(),
            text: "text".into(),
            pub_date,
            author_id: 7,
            location_id: None,
            category_id: Some(1),
            is_published,
            created_at: now(),
            image: None,
        }
    }

    fn user(id: i32) -> User {
        User {
            id,
            username: format!("user{}", id),
            email: "".into(),
            first_name: "".into(),
            last_name: "".into(),
            password_hash: "".into(),
            date_joined: now(),
        }
    }

    #[test]
    fn published_post_in_published_category_is_visible() {
        assert!(post(true, now()).is_visible(Some(&category(true)), now()));
    }

    #[test]
    fn future_post_is_hidden() {
        let p = post(true, now() + Duration::minutes(1));
        assert!(!p.is_visible(Some(&category(true)), now()));
    }

    #[test]
    fn unpublished_category_hides_post() {
        assert!(!post(true, now()).is_visible(Some(&category(false)), now()));
    }

    #[test]
    fn post_without_category_is_hidden() {
        assert!(!post(true, now()).is_visible(None, now()));
    }

    #[test]
    fn author_always_sees_own_post() {
        let p = post(false, now() + Duration::days(3));
        assert!(p.is_visible_to(None, Some(&user(7)), now()));
        assert!(!p.is_visible_to(None, Some(&user(8)), now()));
        assert!(!p.is_visible_to(None, None, now()));
    }
}

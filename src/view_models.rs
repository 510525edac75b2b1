use chrono::{FixedOffset, NaiveDateTime, TimeZone};
use serde::Serialize;

use crate::forms::format_local_datetime;
use crate::media_util::image_url;
use crate::models::{Category, Comment, Location, Post as DBPost, User as DBUser};
use crate::post_util::PostListItem;

#[derive(Debug, Serialize)]
pub struct Date {
    year: i32,
    month: u32,
    day: u32,
    date: String,
    time: String,
    iso: String,
}

impl Date {
    /// Renders a stored UTC timestamp in the site's timezone.
    pub fn local(utc: &NaiveDateTime, offset: &FixedOffset) -> Self {
        let local = offset.from_utc_datetime(utc);
        Self::from(&local)
    }
}

impl<T> std::convert::From<&T> for Date
where
    T: chrono::Datelike + chrono::Timelike,
{
    fn from(date: &T) -> Self {
        let date_str = format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day());
        let time_str = format!("{:02}:{:02}", date.hour(), date.minute());
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
            iso: format!("{}T{}", date_str, time_str),
            date: date_str,
            time: time_str,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct User {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub date_joined: Date,
    pub url: String,
}

impl User {
    pub fn new_from(user: &DBUser, offset: &FixedOffset) -> Self {
        User {
            username: user.username.clone(),
            full_name: user.full_name(),
            email: user.email.clone(),
            date_joined: Date::local(&user.date_joined, offset),
            url: format!("/profile/{}/", user.username),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CategoryRef {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub slug: String,
    pub is_published: bool,
    pub url: String,
}

impl From<&Category> for CategoryRef {
    fn from(c: &Category) -> Self {
        CategoryRef {
            id: c.id,
            title: c.title.clone(),
            description: c.description.clone(),
            slug: c.slug.clone(),
            is_published: c.is_published,
            url: format!("/category/{}/", c.slug),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LocationRef {
    pub id: i32,
    pub name: String,
    pub is_published: bool,
}

impl From<&Location> for LocationRef {
    fn from(l: &Location) -> Self {
        LocationRef {
            id: l.id,
            name: l.name.clone(),
            is_published: l.is_published,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Post {
    pub id: i32,
    pub title: String,
    pub text: String,
    pub pub_date: Date,
    pub pub_date_input: String,
    pub is_published: bool,
    pub author: User,
    pub category: Option<CategoryRef>,
    pub location: Option<LocationRef>,
    pub image_url: Option<String>,
    pub comment_count: i64,
    pub url: String,
}

impl Post {
    pub fn new_from(
        post: DBPost,
        author: &DBUser,
        category: Option<&Category>,
        location: Option<&Location>,
        comment_count: i64,
        offset: &FixedOffset,
    ) -> Self {
        Post {
            url: format!("/posts/{}/", post.id),
            id: post.id,
            pub_date: Date::local(&post.pub_date, offset),
            pub_date_input: format_local_datetime(&post.pub_date, offset),
            is_published: post.is_published,
            author: User::new_from(author, offset),
            category: category.map(CategoryRef::from),
            location: location.map(LocationRef::from),
            image_url: post.image.as_deref().map(image_url),
            comment_count,
            title: post.title,
            text: post.text,
        }
    }

    pub fn from_list_item(item: PostListItem, offset: &FixedOffset) -> Self {
        Post::new_from(
            item.post,
            &item.author,
            item.category.as_ref(),
            item.location.as_ref(),
            item.comment_count,
            offset,
        )
    }
}

#[derive(Debug, Serialize)]
pub struct CommentView {
    pub id: i32,
    pub text: String,
    pub author: User,
    pub created_at: Date,
    pub edit_url: String,
    pub delete_url: String,
}

impl CommentView {
    pub fn new_from(comment: Comment, author: &DBUser, offset: &FixedOffset) -> Self {
        CommentView {
            edit_url: format!("/posts/{}/comment/{}/edit/", comment.post_id, comment.id),
            delete_url: format!("/posts/{}/comment/{}/delete/", comment.post_id, comment.id),
            id: comment.id,
            author: User::new_from(author, offset),
            created_at: Date::local(&comment.created_at, offset),
            text: comment.text,
        }
    }
}

#[cfg(test)]
mod test {
    use chrono::{FixedOffset, NaiveDate};

    use super::Date;

    #[test]
    fn dates_are_shown_in_site_time() {
        let utc = NaiveDate::from_ymd_opt(2024, 1, 31)
            .unwrap()
            .and_hms_opt(22, 5, 0)
            .unwrap();
        let offset = FixedOffset::east_opt(3 * 3600).unwrap();
        let date = Date::local(&utc, &offset);
        assert_eq!(date.date, "2024-02-01");
        assert_eq!(date.time, "01:05");
        assert_eq!(date.day, 1);
    }
}

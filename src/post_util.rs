use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sqlite::Sqlite;

use crate::models::{Category, Comment, Location, Post, User};
use crate::paginator::{Page, Paginator};
use crate::schema::{categories, comments, locations, posts, users};

pub type PostQuery = posts::BoxedQuery<'static, Sqlite>;

/// Restricts `query` to posts `viewer` may see: everything that is published,
/// in a published category and not scheduled for later, plus the viewer's own
/// posts whatever their state.
pub fn filter_published_posts(
    query: PostQuery,
    viewer: Option<&User>,
    now: NaiveDateTime,
) -> PostQuery {
    let published_categories = categories::table
        .filter(categories::is_published.eq(true))
        .select(categories::id.nullable());
    let published = posts::is_published
        .eq(true)
        .and(posts::pub_date.le(now))
        .and(posts::category_id.eq_any(published_categories));

    match viewer {
        Some(user) => query.filter(posts::author_id.eq(user.id).or(published)),
        None => query.filter(published),
    }
}

#[derive(Clone, Debug)]
pub struct AnnotatedPost {
    pub post: Post,
    pub comment_count: i64,
}

/// Attaches the number of comments to each post and orders the result newest
/// first. Posts with the same `pub_date` keep their relative order.
pub fn annotate_comment_count(
    conn: &mut SqliteConnection,
    posts: Vec<Post>,
) -> QueryResult<Vec<AnnotatedPost>> {
    let ids: Vec<i32> = posts.iter().map(|p| p.id).collect();
    let counts: HashMap<i32, i64> = comments::table
        .filter(comments::post_id.eq_any(&ids))
        .group_by(comments::post_id)
        .select((comments::post_id, diesel::dsl::count_star()))
        .load::<(i32, i64)>(conn)?
        .into_iter()
        .collect();

    let mut annotated: Vec<AnnotatedPost> = posts
        .into_iter()
        .map(|post| {
            let comment_count = counts.get(&post.id).copied().unwrap_or(0);
            AnnotatedPost {
                post,
                comment_count,
            }
        })
        .collect();
    annotated.sort_by(|a, b| b.post.pub_date.cmp(&a.post.pub_date));
    Ok(annotated)
}

/// Counts the rows `query` produces and loads the requested page of them,
/// newest first.
pub fn get_paginator_page<F>(
    conn: &mut SqliteConnection,
    query: F,
    page_number: Option<&str>,
    per_page: i64,
) -> QueryResult<Page<Post>>
where
    F: Fn() -> PostQuery,
{
    let count: i64 = query().count().get_result(conn)?;
    let info = Paginator::new(count, per_page).get_page(page_number);

    let items = query()
        .order((posts::pub_date.desc(), posts::id.desc()))
        .limit(info.limit())
        .offset(info.offset())
        .load::<Post>(conn)?;

    Ok(Page::new(items, info))
}

/// A post with the rows the listing templates show next to it.
#[derive(Clone, Debug)]
pub struct PostListItem {
    pub post: Post,
    pub author: User,
    pub category: Option<Category>,
    pub location: Option<Location>,
    pub comment_count: i64,
}

pub fn select_related(
    conn: &mut SqliteConnection,
    annotated: Vec<AnnotatedPost>,
) -> QueryResult<Vec<PostListItem>> {
    let author_ids: HashSet<i32> = annotated.iter().map(|a| a.post.author_id).collect();
    let category_ids: HashSet<i32> = annotated.iter().filter_map(|a| a.post.category_id).collect();
    let location_ids: HashSet<i32> = annotated.iter().filter_map(|a| a.post.location_id).collect();

    let authors: HashMap<i32, User> = users::table
        .filter(users::id.eq_any(author_ids.into_iter().collect::<Vec<_>>()))
        .select(User::as_select())
        .load(conn)?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();
    let categories: HashMap<i32, Category> = categories::table
        .filter(categories::id.eq_any(category_ids.into_iter().collect::<Vec<_>>()))
        .select(Category::as_select())
        .load(conn)?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();
    let locations: HashMap<i32, Location> = locations::table
        .filter(locations::id.eq_any(location_ids.into_iter().collect::<Vec<_>>()))
        .select(Location::as_select())
        .load(conn)?
        .into_iter()
        .map(|l| (l.id, l))
        .collect();

    Ok(annotated
        .into_iter()
        .filter_map(|a| {
            let author = authors.get(&a.post.author_id)?.clone();
            Some(PostListItem {
                category: a.post.category_id.and_then(|id| categories.get(&id).cloned()),
                location: a.post.location_id.and_then(|id| locations.get(&id).cloned()),
                author,
                comment_count: a.comment_count,
                post: a.post,
            })
        })
        .collect())
}

/// Filter, paginate, annotate: the pipeline every post listing goes through.
pub fn list_posts<F>(
    conn: &mut SqliteConnection,
    base: F,
    viewer: Option<&User>,
    now: NaiveDateTime,
    page_number: Option<&str>,
    per_page: i64,
) -> QueryResult<Page<PostListItem>>
where
    F: Fn() -> PostQuery,
{
    let page = get_paginator_page(
        conn,
        || filter_published_posts(base(), viewer, now),
        page_number,
        per_page,
    )?;
    let annotated = annotate_comment_count(conn, page.object_list)?;
    let items = select_related(conn, annotated)?;

    Ok(Page {
        object_list: items,
        number: page.number,
        num_pages: page.num_pages,
        count: page.count,
        has_next: page.has_next,
        has_previous: page.has_previous,
        next_page_number: page.next_page_number,
        previous_page_number: page.previous_page_number,
    })
}

pub fn post_comments(
    conn: &mut SqliteConnection,
    post: i32,
) -> QueryResult<Vec<(Comment, User)>> {
    comments::table
        .inner_join(users::table)
        .filter(comments::post_id.eq(post))
        .order((comments::created_at.asc(), comments::id.asc()))
        .select((Comment::as_select(), User::as_select()))
        .load(conn)
}

/// Removes a post and its comments. Callers run this inside a transaction.
pub fn delete_post_cascade(conn: &mut SqliteConnection, post: i32) -> QueryResult<usize> {
    diesel::delete(comments::table.filter(comments::post_id.eq(post))).execute(conn)?;
    diesel::delete(posts::table.find(post)).execute(conn)
}

pub fn now_utc() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

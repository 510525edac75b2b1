use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDateTime, Offset, Utc};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use tempfile::TempDir;

use crate::app::AppState;
use crate::config::{BlogConfig, SiteConfig};
use crate::handler::BlogDB;
use crate::models::{
    Category, Comment, Location, NewCategory, NewComment, NewLocation, NewPost, NewUser, Post,
    User,
};
use crate::post_util::now_utc;
use crate::schema::{categories, comments, locations, posts, users};
use crate::templates::Templates;

/// A throwaway SQLite file with the schema applied.
pub struct TestDb {
    dir: TempDir,
    path: String,
}

impl TestDb {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blog.db").to_string_lossy().into_owned();
        let db = TestDb { dir, path };
        crate::init_schema(&mut db.conn()).unwrap();
        db
    }

    pub fn conn(&self) -> SqliteConnection {
        let mut conn = SqliteConnection::establish(&self.path).unwrap();
        conn.batch_execute("PRAGMA foreign_keys = ON;").unwrap();
        conn
    }

    pub fn media_dir(&self) -> PathBuf {
        self.dir.path().join("media")
    }

    /// Application state over this database, rendering the crate's own
    /// templates.
    pub fn app_state(&self) -> AppState {
        let config = BlogConfig {
            database_url: self.path.clone(),
            template_dir: env!("CARGO_MANIFEST_DIR").to_string(),
            media_dir: self.media_dir().to_string_lossy().into_owned(),
            listen_addr: crate::DEFAULT_LISTEN_ADDR.to_string(),
            posts_per_page: crate::DEFAULT_POSTS_PER_PAGE,
            session_max_age_secs: crate::DEFAULT_SESSION_MAX_AGE_SECS,
            max_upload_length: crate::DEFAULT_MAX_UPLOAD_LENGTH,
            current_timezone_offset: Utc.fix(),
            site: SiteConfig {
                site_name: "Blogicum".to_string(),
                menu_items: vec![("Home".to_string(), "/".to_string())],
            },
        };
        let pool = crate::new_dbconn_pool(&self.path).unwrap();
        let templates = Templates::from_config(&config).unwrap();
        AppState::new(BlogDB::new(Arc::new(pool)), templates, config)
    }
}

pub fn insert_user(conn: &mut SqliteConnection, username: &str, password_hash: &str) -> User {
    diesel::insert_into(users::table)
        .values(&NewUser {
            username,
            email: "",
            first_name: "",
            last_name: "",
            password_hash,
            date_joined: now_utc(),
        })
        .execute(conn)
        .unwrap();
    User::by_username(username)
        .select(User::as_select())
        .first(conn)
        .unwrap()
}

/// Two users, a published and an unpublished category, and a location.
pub struct Fixture {
    pub alice: User,
    pub bob: User,
    pub open: Category,
    pub hidden: Category,
    pub place: Location,
}

impl Fixture {
    pub fn new(conn: &mut SqliteConnection) -> Self {
        let alice = insert_user(conn, "alice", "!");
        let bob = insert_user(conn, "bob", "!");

        for (slug, is_published) in [("open", true), ("hidden", false)] {
            diesel::insert_into(categories::table)
                .values(&NewCategory {
                    title: slug,
                    description: "",
                    slug,
                    is_published,
                    created_at: now_utc(),
                })
                .execute(conn)
                .unwrap();
        }
        let open = categories::table
            .filter(categories::slug.eq("open"))
            .select(Category::as_select())
            .first(conn)
            .unwrap();
        let hidden = categories::table
            .filter(categories::slug.eq("hidden"))
            .select(Category::as_select())
            .first(conn)
            .unwrap();

        diesel::insert_into(locations::table)
            .values(&NewLocation {
                name: "Moscow",
                is_published: true,
                created_at: now_utc(),
            })
            .execute(conn)
            .unwrap();
        let place = locations::table
            .select(Location::as_select())
            .first(conn)
            .unwrap();

        Fixture {
            alice,
            bob,
            open,
            hidden,
            place,
        }
    }

    pub fn post(
        &self,
        conn: &mut SqliteConnection,
        author: i32,
        category: Option<i32>,
        is_published: bool,
        pub_date: NaiveDateTime,
    ) -> Post {
        diesel::insert_into(posts::table)
            .values(&NewPost {
                title: "A post",
                text: "Some text",
                pub_date,
                author_id: author,
                location_id: Some(self.place.id),
                category_id: category,
                is_published,
                created_at: now_utc(),
                image: None,
            })
            .execute(conn)
            .unwrap();
        posts::table
            .order(posts::id.desc())
            .select(Post::as_select())
            .first(conn)
            .unwrap()
    }

    pub fn comment(&self, conn: &mut SqliteConnection, post: i32, author: i32, text: &str) -> Comment {
        diesel::insert_into(comments::table)
            .values(&NewComment {
                text,
                post_id: post,
                author_id: author,
                created_at: now_utc(),
            })
            .execute(conn)
            .unwrap();
        comments::table
            .order(comments::id.desc())
            .select(Comment::as_select())
            .first(conn)
            .unwrap()
    }
}

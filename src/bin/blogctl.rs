use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use diesel::prelude::*;
use diesel::SqliteConnection;

use blogicum_rs::auth;
use blogicum_rs::models::{Category, Location, NewCategory, NewLocation, NewUser};
use blogicum_rs::post_util::now_utc;
use blogicum_rs::schema::{categories, locations, users};
use blogicum_rs::BlogConfig;

/// Administrative tasks that have no page on the site.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// TOML config file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create any missing tables
    InitDb,
    CreateUser {
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        email: String,
    },
    AddCategory {
        title: String,
        #[arg(long)]
        slug: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Keep the category and its posts off the site for now
        #[arg(long)]
        unpublished: bool,
    },
    AddLocation {
        name: String,
        #[arg(long)]
        unpublished: bool,
    },
    PublishCategory {
        slug: String,
        #[arg(long)]
        unpublish: bool,
    },
    PublishLocation {
        id: i32,
        #[arg(long)]
        unpublish: bool,
    },
    ListCategories,
    ListLocations,
}

fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn run(conn: &mut SqliteConnection, command: Command) -> Result<(), anyhow::Error> {
    match command {
        Command::InitDb => {
            blogicum_rs::init_schema(conn)?;
            println!("schema is up to date");
        }
        Command::CreateUser {
            username,
            password,
            email,
        } => {
            let password_hash = auth::hash_password(&password)?;
            diesel::insert_into(users::table)
                .values(&NewUser {
                    username: &username,
                    email: &email,
                    first_name: "",
                    last_name: "",
                    password_hash: &password_hash,
                    date_joined: now_utc(),
                })
                .execute(conn)
                .with_context(|| format!("could not create user {:?}", username))?;
            println!("created user {}", username);
        }
        Command::AddCategory {
            title,
            slug,
            description,
            unpublished,
        } => {
            if !is_valid_slug(&slug) {
                return Err(anyhow!(
                    "slug {:?} may only contain latin letters, digits, hyphens and underscores",
                    slug
                ));
            }
            diesel::insert_into(categories::table)
                .values(&NewCategory {
                    title: &title,
                    description: &description,
                    slug: &slug,
                    is_published: !unpublished,
                    created_at: now_utc(),
                })
                .execute(conn)
                .with_context(|| format!("could not add category {:?}", slug))?;
            println!("added category {}", slug);
        }
        Command::AddLocation { name, unpublished } => {
            diesel::insert_into(locations::table)
                .values(&NewLocation {
                    name: &name,
                    is_published: !unpublished,
                    created_at: now_utc(),
                })
                .execute(conn)?;
            println!("added location {}", name);
        }
        Command::PublishCategory { slug, unpublish } => {
            let updated = diesel::update(categories::table.filter(categories::slug.eq(&slug)))
                .set(categories::is_published.eq(!unpublish))
                .execute(conn)?;
            if updated == 0 {
                return Err(anyhow!("no category with slug {:?}", slug));
            }
            println!("category {} published: {}", slug, !unpublish);
        }
        Command::PublishLocation { id, unpublish } => {
            let updated = diesel::update(locations::table.find(id))
                .set(locations::is_published.eq(!unpublish))
                .execute(conn)?;
            if updated == 0 {
                return Err(anyhow!("no location with id {}", id));
            }
            println!("location {} published: {}", id, !unpublish);
        }
        Command::ListCategories => {
            let all = categories::table
                .order(categories::title.asc())
                .select(Category::as_select())
                .load(conn)?;
            for c in all {
                let state = if c.is_published { "published" } else { "hidden" };
                println!("{}\t{}\t{}\t{}", c.id, c.slug, state, c.title);
            }
        }
        Command::ListLocations => {
            let all = locations::table
                .order(locations::name.asc())
                .select(Location::as_select())
                .load(conn)?;
            for l in all {
                let state = if l.is_published { "published" } else { "hidden" };
                println!("{}\t{}\t{}", l.id, state, l.name);
            }
        }
    }
    Ok(())
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    let config = BlogConfig::load(&cli.config)?;

    let dbpool = blogicum_rs::new_dbconn_pool(&config.database_url)?;
    let mut conn = dbpool.get()?;
    if !matches!(cli.command, Command::InitDb) {
        blogicum_rs::init_schema(&mut conn)?;
    }

    run(&mut conn, cli.command)
}

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use log::info;
use tracing_subscriber::EnvFilter;

use blogicum_rs::app::{self, AppState};
use blogicum_rs::handler::BlogDB;
use blogicum_rs::templates::Templates;
use blogicum_rs::BlogConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve the blog over HTTP")]
struct Args {
    /// TOML config file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = BlogConfig::load(&args.config)?;

    let dbpool = blogicum_rs::new_dbconn_pool(&config.database_url)?;
    {
        let mut conn = dbpool.get()?;
        blogicum_rs::init_schema(&mut conn)?;
    }
    info!("created dbpool from {:?}", config.database_url);

    let templates = Templates::from_config(&config)?;
    info!(
        "initialized template system with templates in {:?}",
        config.template_dir
    );

    tokio::fs::create_dir_all(&config.media_dir)
        .await
        .with_context(|| format!("could not create media dir {:?}", config.media_dir))?;

    let listen_addr = config.listen_addr.clone();
    let state = AppState::new(BlogDB::new(Arc::new(dbpool)), templates, config);

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("could not listen on {}", listen_addr))?;
    info!("listening on {}", listen_addr);
    axum::serve(listener, app::router(state)).await?;

    Ok(())
}

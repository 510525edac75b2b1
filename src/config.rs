use std::path::{Path, PathBuf};

use chrono::Offset;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Clone, Debug, Deserialize)]
pub struct BlogConfig {
    pub database_url: String,
    pub template_dir: String,
    pub media_dir: String,

    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default = "default_posts_per_page")]
    pub posts_per_page: i64,

    #[serde(default = "default_session_max_age")]
    pub session_max_age_secs: i64,

    #[serde(default = "default_max_upload_length")]
    pub max_upload_length: usize,

    #[serde(deserialize_with = "offset_deserialize::deserialize")]
    #[serde(default = "default_offset")]
    pub current_timezone_offset: chrono::FixedOffset,

    pub site: SiteConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SiteConfig {
    pub site_name: String,
    #[serde(default = "default_menu_items")]
    pub menu_items: Vec<(String, String)>,
}

impl BlogConfig {
    /// Reads the TOML config at `path`. `DATABASE_URL` in the environment wins
    /// over the file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if let Ok(url) = std::env::var(crate::DATABASE_URL_VAR) {
            config.database_url = url;
        }
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub fn template_glob(&self) -> String {
        Path::new(&self.template_dir)
            .join("templates/**/*.html")
            .to_string_lossy()
            .into_owned()
    }

    pub fn static_dir(&self) -> PathBuf {
        Path::new(&self.template_dir).join("static")
    }
}

fn default_listen_addr() -> String {
    crate::DEFAULT_LISTEN_ADDR.into()
}

fn default_posts_per_page() -> i64 {
    crate::DEFAULT_POSTS_PER_PAGE
}

fn default_session_max_age() -> i64 {
    crate::DEFAULT_SESSION_MAX_AGE_SECS
}

fn default_max_upload_length() -> usize {
    crate::DEFAULT_MAX_UPLOAD_LENGTH
}

fn default_offset() -> chrono::FixedOffset {
    chrono::Utc.fix()
}

fn default_menu_items() -> Vec<(String, String)> {
    crate::MENU_ITEMS
        .iter()
        .map(|(name, url)| (name.to_string(), url.to_string()))
        .collect()
}

mod offset_deserialize {
    use chrono::FixedOffset;
    use serde::{self, Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<FixedOffset, D::Error>
    where
        D: Deserializer<'de>,
    {
        let offset_seconds = i32::deserialize(deserializer)?;
        let offset = FixedOffset::east_opt(offset_seconds)
            .ok_or(serde::de::Error::custom("invalid offset"))?;
        Ok(offset)
    }
}

#[cfg(test)]
mod test {
    use super::BlogConfig;

    #[test]
    fn it_fills_in_defaults() {
        let config = BlogConfig::from_toml(
            r#"
            database_url = "blog.db"
            template_dir = "."
            media_dir = "media"

            [site]
            site_name = "Blogicum"
            "#,
        )
        .unwrap();

        assert_eq!(config.posts_per_page, 10);
        assert_eq!(config.listen_addr, "0.0.0.0:3030");
        assert_eq!(config.current_timezone_offset.local_minus_utc(), 0);
        assert_eq!(config.site.menu_items, vec![("Home".to_string(), "/".to_string())]);
    }

    #[test]
    fn it_reads_timezone_offset_in_seconds() {
        let config = BlogConfig::from_toml(
            r#"
            database_url = "blog.db"
            template_dir = "."
            media_dir = "media"
            current_timezone_offset = 10800

            [site]
            site_name = "Blogicum"
            "#,
        )
        .unwrap();

        assert_eq!(config.current_timezone_offset.local_minus_utc(), 10800);
    }

    #[test]
    fn it_rejects_out_of_range_offsets() {
        let result = BlogConfig::from_toml(
            r#"
            database_url = "blog.db"
            template_dir = "."
            media_dir = "media"
            current_timezone_offset = 999999

            [site]
            site_name = "Blogicum"
            "#,
        );

        assert!(result.is_err());
    }
}

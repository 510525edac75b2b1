use anyhow::{Context, Result};
use serde::ser::Serialize;
use tera::{Context as TeraContext, Tera};

use crate::config::BlogConfig;

/// Compiled templates plus the context every page starts from. Adding context
/// returns a new value; the shared base is never mutated.
#[derive(Clone, Debug)]
pub struct Templates {
    tera: std::sync::Arc<Tera>,
    ctx: TeraContext,
}

impl Templates {
    pub fn new(tera: std::sync::Arc<Tera>, base_ctx: TeraContext) -> Self {
        Self { tera, ctx: base_ctx }
    }

    /// Loads every `templates/**/*.html` under the configured template dir.
    pub fn from_config(config: &BlogConfig) -> Result<Self> {
        let pattern = config.template_glob();
        let tera = Tera::new(&pattern)
            .with_context(|| format!("could not load templates from {}", pattern))?;

        let mut base_ctx = TeraContext::new();
        base_ctx.insert("BLOGICUM_RS_VERSION", env!("CARGO_PKG_VERSION"));
        base_ctx.insert("DEFAULT_LANG", "en-US");
        base_ctx.insert("SITENAME", &config.site.site_name);
        base_ctx.insert("MENUITEMS", &config.site.menu_items);
        base_ctx.insert("LOGIN_URL", crate::LOGIN_URL);

        Ok(Self::new(std::sync::Arc::new(tera), base_ctx))
    }

    pub fn add_context<T: Serialize + ?Sized>(&self, key: &str, val: &T) -> Templates {
        let mut new_ctx = self.ctx.clone();
        new_ctx.insert(key, val);

        Templates {
            tera: self.tera.clone(),
            ctx: new_ctx,
        }
    }

    pub fn render(&self, template: &str) -> Result<String> {
        self.tera
            .render(template, &self.ctx)
            .context("tera template rendering failed")
    }
}

//! Functions available to layouts and page bodies.
//!
//! Every helper closes over one shared, immutable [`RenderContext`] built
//! after all pages are parsed and all static assets hashed, so each template
//! execution sees the same complete view of the build.
//!
//! | helper      | arguments                           |
//! |-------------|-------------------------------------|
//! | `content`   | `page`                              |
//! | `time`      | `date`, optional `format`           |
//! | `icon`      | `name`                              |
//! | `image`     | `path`, `caption`                   |
//! | `navLink`   | `page`, `title`, `icon`, `path`     |
//! | `pages`     | optional `type`                     |
//! | `url`       | `path`                              |
//! | `static`    | `path`                              |
//! | `vanity`    |                                     |
//! | `vanityURL` | `path`                              |

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, SecondsFormat};
use tera::{Tera, Value};

use crate::assets::AssetMap;
use crate::config::Config;
use crate::links::{is_full_url, join_url};
use crate::page::Page;

/// Display format used by `time` when none is given.
pub const DEFAULT_DATE_FORMAT: &str = "%B %-d, %Y";

const ICON_SPRITE: &str = "/icons/sprite.svg";

/// Everything the helpers need to know about the current build.
#[derive(Debug, Clone)]
pub struct RenderContext {
    config: Config,
    assets: AssetMap,
    pages: Vec<Value>,
}

impl RenderContext {
    /// Snapshots `pages` in their current (build) order.
    pub fn new(config: Config, assets: AssetMap, pages: &[Page]) -> serde_json::Result<Self> {
        let pages = pages
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<_, _>>()?;
        Ok(Self {
            config,
            assets,
            pages,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Absolute URL for `path` in production builds, `path` itself otherwise.
    pub fn url(&self, path: &str) -> String {
        if is_full_url(path) || !self.config.prod {
            return path.to_string();
        }
        join_url(&self.config.base_url, path)
    }

    /// `path` on the primary site, for links from the vanity site.
    pub fn vanity_url(&self, path: &str) -> String {
        if is_full_url(path) {
            return path.to_string();
        }
        join_url(&self.config.primary_url, path)
    }

    /// Fingerprinted URL of a static asset, falling back to [`Self::url`].
    pub fn static_path(&self, path: &str) -> String {
        match self.assets.resolve(path) {
            Some(fingerprinted) => self.url(&fingerprinted),
            None => self.url(path),
        }
    }

    pub fn icon(&self, name: &str) -> String {
        format!(
            r#"<svg class="icon" aria-hidden="true"><use xlink:href="{}#icon-{}"/></svg>"#,
            self.static_path(ICON_SPRITE),
            html_escape::encode_double_quoted_attribute(name)
        )
    }

    pub fn image(&self, path: &str, caption: &str) -> String {
        format!(
            r#"<figure><img alt="{}" src="{}" loading="lazy"/><figcaption>{}</figcaption></figure>"#,
            html_escape::encode_double_quoted_attribute(caption),
            self.static_path(path),
            caption
        )
    }

    /// Navigation anchor. On the vanity site only the link to the base URL is
    /// current and hrefs point at the primary site; otherwise the link to the
    /// page's own permalink is current.
    pub fn nav_link(&self, permalink: &str, title: &str, icon: &str, path: &str) -> String {
        let current = if self.config.vanity {
            path.trim_end_matches('/') == self.config.base_url.as_str().trim_end_matches('/')
        } else {
            permalink == path
        };

        let href = if self.config.vanity {
            self.vanity_url(path)
        } else {
            self.url(path)
        };
        let class = if current { r#" class="current""# } else { "" };

        format!(r#"<a href="{href}"{class}>{}{title}</a>"#, self.icon(icon))
    }

    /// Pages in build order, optionally only those of one type.
    pub fn pages(&self, kind: Option<&str>) -> Vec<Value> {
        match kind {
            None | Some("") => self.pages.clone(),
            Some(kind) => self
                .pages
                .iter()
                .filter(|p| p.get("type").and_then(Value::as_str) == Some(kind))
                .cloned()
                .collect(),
        }
    }
}

/// `<time>` element with a machine-readable and a formatted value.
pub fn time_element(date: NaiveDate, format: &str) -> Result<String, std::fmt::Error> {
    let mut display = String::new();
    write!(display, "{}", date.format(format))?;
    let machine = date
        .and_time(NaiveTime::MIN)
        .and_utc()
        .to_rfc3339_opts(SecondsFormat::Secs, true);
    Ok(format!(r#"<time datetime="{machine}">{display}</time>"#))
}

type Args = HashMap<String, Value>;

fn str_arg<'a>(args: &'a Args, function: &str, key: &str) -> tera::Result<&'a str> {
    args.get(key).and_then(Value::as_str).ok_or_else(|| {
        tera::Error::msg(format!("{function}: missing string argument `{key}`"))
    })
}

fn page_arg<'a>(args: &'a Args, function: &str) -> tera::Result<&'a Value> {
    args.get("page")
        .filter(|p| p.is_object())
        .ok_or_else(|| tera::Error::msg(format!("{function}: missing argument `page`")))
}

/// Registers the helper set on `tera`.
///
/// `pages` returns front matter captured before any page renders, so
/// `content(page=p)` on one of its entries yields the unrendered body with
/// template tags and Markdown left as written.
pub fn register(tera: &mut Tera, ctx: Arc<RenderContext>) {
    tera.register_function("content", |args: &Args| -> tera::Result<Value> {
        let page = page_arg(args, "content")?;
        Ok(page.get("content").cloned().unwrap_or_default())
    });

    tera.register_function("time", |args: &Args| -> tera::Result<Value> {
        let raw = str_arg(args, "time", "date")?;
        let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|e| tera::Error::msg(format!("time: invalid date {raw:?}: {e}")))?;
        let format = args
            .get("format")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_DATE_FORMAT);
        time_element(date, format)
            .map(Value::String)
            .map_err(|_| tera::Error::msg(format!("time: invalid format {format:?}")))
    });

    let c = ctx.clone();
    tera.register_function("icon", move |args: &Args| -> tera::Result<Value> {
        Ok(Value::String(c.icon(str_arg(args, "icon", "name")?)))
    });

    let c = ctx.clone();
    tera.register_function("image", move |args: &Args| -> tera::Result<Value> {
        let path = str_arg(args, "image", "path")?;
        let caption = str_arg(args, "image", "caption")?;
        Ok(Value::String(c.image(path, caption)))
    });

    let c = ctx.clone();
    tera.register_function("navLink", move |args: &Args| -> tera::Result<Value> {
        let permalink = page_arg(args, "navLink")?
            .get("permalink")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let title = str_arg(args, "navLink", "title")?;
        let icon = str_arg(args, "navLink", "icon")?;
        let path = str_arg(args, "navLink", "path")?;
        Ok(Value::String(c.nav_link(permalink, title, icon, path)))
    });

    let c = ctx.clone();
    tera.register_function("pages", move |args: &Args| -> tera::Result<Value> {
        let kind = args.get("type").and_then(Value::as_str);
        Ok(Value::Array(c.pages(kind)))
    });

    let c = ctx.clone();
    tera.register_function("url", move |args: &Args| -> tera::Result<Value> {
        Ok(Value::String(c.url(str_arg(args, "url", "path")?)))
    });

    let c = ctx.clone();
    tera.register_function("static", move |args: &Args| -> tera::Result<Value> {
        Ok(Value::String(c.static_path(str_arg(args, "static", "path")?)))
    });

    let c = ctx.clone();
    tera.register_function("vanity", move |_: &Args| -> tera::Result<Value> {
        Ok(Value::Bool(c.config.vanity))
    });

    let c = ctx;
    tera.register_function("vanityURL", move |args: &Args| -> tera::Result<Value> {
        Ok(Value::String(c.vanity_url(str_arg(args, "vanityURL", "path")?)))
    });
}

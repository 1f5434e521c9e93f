use anyhow::{Context, Result};
use clap::ArgMatches;
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use url::Url;

/// Complete configuration that merges CLI args, env vars, config files, and defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QuillConfig {
    /// Build configuration
    pub build: BuildConfig,
    /// Site metadata
    pub site: SiteConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BuildConfig {
    /// Directory containing `pages`, `static` and `templates`
    pub source: String,
    /// Output directory for generated site
    pub output: String,
    /// Configuration file path
    pub config: String,
    /// Address for the dev server
    pub listen: String,
    /// Production build: no drafts, absolute URLs
    pub prod: bool,
    /// Don't write the Atom feed
    pub skip_feed: bool,
    /// Build the vanity import site
    pub vanity: bool,
    /// Open browser automatically
    pub open: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source: ".".to_string(),
            output: "./build".to_string(),
            config: "./quill.toml".to_string(),
            listen: "localhost:3000".to_string(),
            prod: false,
            skip_feed: false,
            vanity: false,
            open: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteConfig {
    pub title: String,
    pub author: String,
    pub base_url: String,
    pub primary_url: String,
    /// Static files that keep their name
    pub skip_fingerprint: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        let core = quill_core::Config::default();
        Self {
            title: core.title,
            author: core.author,
            base_url: core.base_url.to_string(),
            primary_url: core.primary_url.to_string(),
            skip_fingerprint: core.skip_fingerprint,
        }
    }
}

impl QuillConfig {
    /// Load configuration with cascading precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables (QUILL_*)
    /// 3. Configuration file
    /// 4. Defaults (lowest priority)
    pub fn load(args: &ArgMatches) -> Result<Self> {
        let defaults = Self::default();
        let config_file = args
            .try_get_one::<String>("config")
            .ok()
            .flatten()
            .cloned()
            .unwrap_or_else(|| defaults.build.config.clone());

        let mut builder = ConfigBuilder::builder();

        // 1. Start with defaults
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. Add configuration file if it exists
        let path = Path::new(&config_file);
        if path.exists() {
            builder = builder.add_source(File::from(path));
        }

        // 3. Add environment variables with QUILL_ prefix
        builder = builder.add_source(
            Environment::with_prefix("QUILL")
                .prefix_separator("_")
                .separator("__") // Use double underscore for nested keys
                .try_parsing(true),
        );

        // 4. Override with CLI arguments (highest priority). Only args defined
        // for this command and actually given count.
        for key in ["source", "output", "config", "listen"] {
            if let Some(value) = args.try_get_one::<String>(key).ok().flatten() {
                builder = builder.set_override(format!("build.{key}"), value.as_str())?;
            }
        }
        for key in ["prod", "skip_feed", "vanity", "open"] {
            if args.try_get_one::<bool>(key).ok().flatten() == Some(&true) {
                builder = builder.set_override(format!("build.{key}"), true)?;
            }
        }

        // Build and deserialize
        let config = builder.build()?;
        let quill_config: QuillConfig = config.try_deserialize()?;

        Ok(quill_config)
    }

    /// The build configuration for quill-core.
    pub fn site_config(&self) -> Result<quill_core::Config> {
        let base_url = Url::parse(&self.site.base_url)
            .with_context(|| format!("invalid base_url {:?}", self.site.base_url))?;
        let primary_url = Url::parse(&self.site.primary_url)
            .with_context(|| format!("invalid primary_url {:?}", self.site.primary_url))?;

        Ok(quill_core::Config {
            title: self.site.title.clone(),
            author: self.site.author.clone(),
            base_url,
            primary_url,
            src: PathBuf::from(&self.build.source),
            dst: PathBuf::from(&self.build.output),
            prod: self.build.prod,
            skip_feed: self.build.skip_feed,
            vanity: self.build.vanity,
            skip_fingerprint: self.site.skip_fingerprint.clone(),
            feed_updated: None,
        })
    }

    /// The dev server's listen address, resolving host names.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.build
            .listen
            .to_socket_addrs()
            .with_context(|| format!("invalid listen address {:?}", self.build.listen))?
            .next()
            .with_context(|| format!("{:?} resolved to no address", self.build.listen))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{Arg, ArgAction, Command};

    fn command() -> Command {
        Command::new("test")
            .arg(Arg::new("source").long("source").value_name("DIR"))
            .arg(Arg::new("output").long("output").value_name("DIR"))
            .arg(Arg::new("config").long("config").value_name("FILE"))
            .arg(Arg::new("prod").long("prod").action(ArgAction::SetTrue))
    }

    #[test]
    fn test_default_config() {
        let config = QuillConfig::default();
        assert_eq!(config.build.source, ".");
        assert_eq!(config.build.output, "./build");
        assert_eq!(config.build.listen, "localhost:3000");
        assert!(!config.build.prod);
        assert_eq!(config.site.skip_fingerprint, vec!["robots.txt"]);
    }

    #[test]
    fn test_cli_args_override() {
        let matches = command()
            .try_get_matches_from(vec![
                "test",
                "--source", "/custom/source",
                "--output", "/custom/output",
                "--config", "/nonexistent/quill.toml",
                "--prod",
            ])
            .unwrap();

        let config = QuillConfig::load(&matches).unwrap();
        assert_eq!(config.build.source, "/custom/source");
        assert_eq!(config.build.output, "/custom/output");
        assert!(config.build.prod);
        // Should still have defaults for non-overridden values
        assert_eq!(config.build.listen, "localhost:3000");
        assert!(!config.build.skip_feed);
    }

    #[test]
    fn test_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("quill.toml");
        std::fs::write(
            &file,
            r#"
[build]
output = "./public"
skip_feed = true

[site]
title = "My Site"
base_url = "https://blog.example.org"
"#,
        )
        .unwrap();

        let file = file.to_string_lossy().into_owned();
        let matches = command()
            .try_get_matches_from(vec!["test", "--config", file.as_str(), "--output", "./out"])
            .unwrap();
        let config = QuillConfig::load(&matches).unwrap();

        // Flags beat the file, the file beats defaults.
        assert_eq!(config.build.output, "./out");
        assert!(config.build.skip_feed);
        assert_eq!(config.build.source, ".");
        assert_eq!(config.site.title, "My Site");

        let site = config.site_config().unwrap();
        assert_eq!(site.base_url.as_str(), "https://blog.example.org/");
        assert_eq!(site.dst, PathBuf::from("./out"));
        assert!(site.skip_feed);
    }

    #[test]
    fn test_invalid_base_url() {
        let mut config = QuillConfig::default();
        config.site.base_url = "not a url".to_string();
        let err = config.site_config().unwrap_err();
        assert!(err.to_string().contains("invalid base_url"));
    }

    #[test]
    fn test_listen_addr() {
        let mut config = QuillConfig::default();
        config.build.listen = "127.0.0.1:8080".to_string();
        assert_eq!(
            config.listen_addr().unwrap(),
            "127.0.0.1:8080".parse::<SocketAddr>().unwrap()
        );

        config.build.listen = "nonsense".to_string();
        assert!(config.listen_addr().is_err());
    }
}

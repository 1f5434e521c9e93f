pub mod assets;
pub mod builder;
pub mod config;
pub mod feed;
pub mod helpers;
pub mod links;
pub mod markdown;
pub mod minify;
pub mod page;
pub mod renderer;
pub mod scanner;
pub mod template;

// Re-export main types
pub use assets::{AssetError, AssetMap};
pub use builder::{BuildError, BuildReport, build};
pub use config::Config;
pub use feed::FeedError;
pub use helpers::RenderContext;
pub use page::{Page, PageError};
pub use renderer::RenderError;
pub use template::{TemplateError, TemplateSet};

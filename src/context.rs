use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _};
use handlebars::Handlebars;

use crate::renderer::generate_renderer;

pub(crate) const DEFAULT_SITE_TITLE: &str = "Lehigh Library Technology Blog";
pub(crate) const DEFAULT_SITE_URL: &str = "https://lehigh-university-libraries.github.io/blog/";
pub(crate) const DEFAULT_POSTS_PER_PAGE: usize = 10;

#[derive(Debug, Clone)]
pub(crate) struct TemplateFiles {
    pub post: PathBuf,
    pub index: PathBuf,
    pub feed: PathBuf,
}

impl TemplateFiles {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            post: dir.join("post.html"),
            index: dir.join("index.html"),
            feed: dir.join("rss.xml"),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ThemeFiles {
    pub header: PathBuf,
    pub footer: PathBuf,
}

impl ThemeFiles {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            header: dir.join("header.html"),
            footer: dir.join("footer.html"),
        }
    }
}

/// Everything a build needs to know. Paths are relative to the working
/// directory unless given absolute.
#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub posts_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Copied into `{output_dir}/assets` when it exists.
    pub assets_dir: PathBuf,
    pub templates: TemplateFiles,
    pub theme_files: ThemeFiles,

    pub site_title: String,
    pub site_url: String,
    pub site_description: String,
    pub posts_per_page: usize,
    /// File name of the feed inside `output_dir`.
    pub feed_file: String,

    /// Prefix for relative image paths. `None` leaves them untouched.
    pub image_base_url: Option<String>,
    pub default_author: Option<String>,
    pub highlight: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            posts_dir: PathBuf::from("posts"),
            output_dir: PathBuf::from("public"),
            assets_dir: PathBuf::from("assets"),
            templates: TemplateFiles::in_dir(Path::new("templates")),
            theme_files: ThemeFiles::in_dir(Path::new("theme")),
            site_title: DEFAULT_SITE_TITLE.to_string(),
            site_url: DEFAULT_SITE_URL.to_string(),
            site_description: String::new(),
            posts_per_page: DEFAULT_POSTS_PER_PAGE,
            feed_file: "rss.xml".to_string(),
            image_base_url: None,
            default_author: None,
            highlight: false,
        }
    }
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.posts_dir.is_dir() {
            bail!("posts_dir must be a directory: {:?}", self.posts_dir);
        }
        if self.output_dir.exists() && !self.output_dir.is_dir() {
            bail!("if output_dir exists, it must be directory: {:?}", self.output_dir);
        }
        if self.posts_per_page == 0 {
            bail!("posts_per_page must be at least 1");
        }
        Ok(())
    }
}

/// A validated [`Config`] together with the loaded templates and theme
/// fragments. Built once and lent to every generation step.
#[derive(Debug)]
pub(crate) struct Context {
    pub config: Config,
    pub handlebars: Handlebars<'static>,
    pub header: String,
    pub footer: String,
}

impl Context {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        config.validate()?;
        let handlebars = generate_renderer(&config.templates)?;
        let header = std::fs::read_to_string(&config.theme_files.header)
            .with_context(|| format!("reading header {:?}", config.theme_files.header))?;
        let footer = std::fs::read_to_string(&config.theme_files.footer)
            .with_context(|| format!("reading footer {:?}", config.theme_files.footer))?;

        Ok(Self {
            config,
            handlebars,
            header,
            footer,
        })
    }
}

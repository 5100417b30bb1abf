use std::path::PathBuf;

use anyhow::Context as _;
use clap::{command, value_parser, Arg, ArgAction, ArgMatches, Command};
use context::{Config, Context, TemplateFiles, ThemeFiles};
use generator::generate;
use log::info;

mod context;
mod generator;
mod renderer;

fn config_from(matches: &ArgMatches) -> anyhow::Result<Config> {
    let path = |id: &str| -> anyhow::Result<PathBuf> {
        matches
            .get_one::<PathBuf>(id)
            .cloned()
            .with_context(|| format!("missing {id}"))
    };
    let text = |id: &str| matches.get_one::<String>(id).cloned();
    let defaults = Config::default();

    Ok(Config {
        posts_dir: path("posts_dir")?,
        output_dir: path("output_dir")?,
        assets_dir: path("assets_dir")?,
        templates: TemplateFiles::in_dir(&path("template_dir")?),
        theme_files: ThemeFiles::in_dir(&path("theme_dir")?),
        site_title: text("site_title").unwrap_or(defaults.site_title),
        site_url: text("site_url").unwrap_or(defaults.site_url),
        site_description: text("site_description").unwrap_or(defaults.site_description),
        posts_per_page: matches
            .get_one::<usize>("posts_per_page")
            .copied()
            .unwrap_or(defaults.posts_per_page),
        feed_file: text("feed_file").unwrap_or(defaults.feed_file),
        image_base_url: text("image_base_url"),
        default_author: text("default_author"),
        highlight: matches.get_flag("highlight"),
    })
}

fn cli() -> Command {
    command!()
        .args(&[
            Arg::new("posts_dir")
                .long("posts-dir")
                .help("Directory searched recursively for *.md posts")
                .value_parser(value_parser!(PathBuf))
                .default_value("posts"),
            Arg::new("output_dir")
                .long("output-dir")
                .help("Directory the site is written to. Existing files are overwritten, never removed.")
                .value_parser(value_parser!(PathBuf))
                .default_value("public"),
            Arg::new("assets_dir")
                .long("assets-dir")
                .help("Directory copied as it is into <output-dir>/assets, when present")
                .value_parser(value_parser!(PathBuf))
                .default_value("assets"),
            Arg::new("template_dir")
                .long("template-dir")
                .help("Directory holding post.html, index.html and rss.xml")
                .value_parser(value_parser!(PathBuf))
                .default_value("templates"),
            Arg::new("theme_dir")
                .long("theme-dir")
                .help("Directory holding header.html and footer.html")
                .value_parser(value_parser!(PathBuf))
                .default_value("theme"),
            Arg::new("site_title").long("site-title").help("Blog title"),
            Arg::new("site_url").long("site-url").help("Public URL of the blog"),
            Arg::new("site_description")
                .long("site-description")
                .help("Feed description"),
            Arg::new("posts_per_page")
                .long("posts-per-page")
                .help("Posts listed on each index page")
                .value_parser(value_parser!(usize)),
            Arg::new("feed_file")
                .long("feed-file")
                .help("File name of the RSS feed inside the output directory"),
            Arg::new("image_base_url")
                .long("image-base-url")
                .help("Prefix for relative image paths in posts"),
            Arg::new("default_author")
                .long("default-author")
                .help("Author used when a post does not name one"),
            Arg::new("highlight")
                .long("highlight")
                .help("Highlight fenced code blocks and write assets/codehilite.css")
                .action(ArgAction::SetTrue),
        ])
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let matches = cli().get_matches();
    let ctx = Context::new(config_from(&matches)?)?;
    let posts = generate(&ctx)?;
    info!("Built {} posts into {:?}", posts.len(), ctx.config.output_dir);

    Ok(())
}

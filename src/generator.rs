use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use chrono::Utc;
use fs_extra::dir::CopyOptions;
use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::context::Context;

use self::{
    data::{FeedData, IndexPageData, PostPageData},
    frontmatter::parse_front_matter,
    markdown::{first_paragraph, highlight_css, to_html},
    transform::{convert_mermaid_blocks, rewrite_image_paths},
    utils::{index_file_name, neighbour_pages, pub_date, rfc822, sort_post, total_pages},
};

pub(crate) use self::data::RenderedPost;

mod data;
mod frontmatter;
mod markdown;
mod transform;
mod utils;

const UNTITLED: &str = "Untitled";
const ASSETS_OUT_DIR: &str = "assets";
const HIGHLIGHT_CSS: &str = "codehilite.css";

fn create_output(path: &Path) -> anyhow::Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.exists()) {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let fd = File::create(path).with_context(|| format!("creating {:?}", path))?;
    Ok(BufWriter::new(fd))
}

fn copy_assets(ctx: &Context) -> anyhow::Result<()> {
    let assets_dir = &ctx.config.assets_dir;
    if !assets_dir.is_dir() {
        info!("Asset directory {:?} does not exist. skipping...", assets_dir);
        return Ok(());
    }

    let dest = ctx.config.output_dir.join(ASSETS_OUT_DIR);
    fs_extra::dir::create_all(&dest, false)?;
    let mut cp_opts = CopyOptions::new();
    cp_opts.copy_inside = true;
    cp_opts.content_only = true;
    cp_opts.overwrite = true;
    fs_extra::dir::copy(assets_dir, &dest, &cp_opts)
        .with_context(|| format!("while copying {:?} to {:?}", assets_dir, dest))?;
    info!("Copied assets into {:?}", dest);
    Ok(())
}

fn write_highlight_css(ctx: &Context) -> anyhow::Result<()> {
    let out_path = ctx.config.output_dir.join(ASSETS_OUT_DIR).join(HIGHLIGHT_CSS);
    let mut fd = create_output(&out_path)?;
    fd.write_all(highlight_css()?.as_bytes())?;
    fd.flush()?;
    info!("Wrote {:?}", out_path);
    Ok(())
}

/// Every `*.md` file below `posts_dir`, in file-name order per directory.
fn discover_posts(posts_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut sources = vec![];
    for entry in WalkDir::new(posts_dir).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == "md") {
            debug!("Found post {:?}", entry.path());
            sources.push(entry.into_path());
        }
    }
    Ok(sources)
}

fn render_post(ctx: &Context, source: &Path) -> anyhow::Result<RenderedPost> {
    let config = &ctx.config;
    let text = std::fs::read_to_string(source)?;
    let (metadata, body) = parse_front_matter(&text)?;

    let mut md = convert_mermaid_blocks(body);
    if let Some(base_url) = &config.image_base_url {
        md = rewrite_image_paths(&md, base_url);
    }
    let content = to_html(&md, config.highlight);

    let title = metadata.title.unwrap_or_else(|| UNTITLED.to_string());
    let date = metadata.date.unwrap_or_default();
    let author = metadata.author.or_else(|| config.default_author.clone());

    let file_name = source
        .with_extension("html")
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .with_context(|| format!("invalid post file name {:?}", source))?;
    let out_path = config.output_dir.join(&file_name);

    let data = PostPageData {
        site_title: &config.site_title,
        site_url: &config.site_url,
        title: &title,
        date: &date,
        author: author.as_deref(),
        content: &content,
        tags: &metadata.tags,
        header: &ctx.header,
        footer: &ctx.footer,
    };
    let mut fd = create_output(&out_path)?;
    ctx.handlebars.render_to_write("post", &data, &mut fd)?;
    fd.flush()?;
    info!("Wrote {:?}", out_path);

    let pub_date = pub_date(&date);
    if pub_date.is_none() && !date.is_empty() {
        warn!("{:?}: date {:?} is not YYYY-MM-DD, feed item has no pubDate", source, date);
    }

    Ok(RenderedPost {
        snippet: first_paragraph(&content).to_string(),
        title,
        date,
        author,
        tags: metadata.tags,
        url: file_name,
        pub_date,
    })
}

fn render_index(
    ctx: &Context,
    posts: &[RenderedPost],
    page_num: usize,
    total_pages: usize,
) -> anyhow::Result<()> {
    let (prev_page, next_page) = neighbour_pages(page_num, total_pages);
    let data = IndexPageData {
        site_title: &ctx.config.site_title,
        posts,
        header: &ctx.header,
        footer: &ctx.footer,
        page_num,
        total_pages,
        prev_page,
        next_page,
    };

    let out_path = ctx.config.output_dir.join(index_file_name(page_num));
    let mut fd = create_output(&out_path)?;
    ctx.handlebars
        .render_to_write("index", &data, &mut fd)
        .with_context(|| format!("while generating {:?}", out_path))?;
    fd.flush()?;
    info!("Wrote {:?} ({} posts)", out_path, posts.len());
    Ok(())
}

fn render_feed(ctx: &Context, posts: &[RenderedPost]) -> anyhow::Result<()> {
    let config = &ctx.config;
    let data = FeedData {
        posts,
        blog_title: &config.site_title,
        blog_url: &config.site_url,
        blog_description: &config.site_description,
        build_date: rfc822(Utc::now()),
    };

    let out_path = config.output_dir.join(&config.feed_file);
    let mut fd = create_output(&out_path)?;
    ctx.handlebars
        .render_to_write("rss", &data, &mut fd)
        .with_context(|| format!("while generating {:?}", out_path))?;
    fd.flush()?;
    info!("Wrote {:?}", out_path);
    Ok(())
}

/// Builds the whole site. Returns the posts in the order they were listed.
pub(crate) fn generate(ctx: &Context) -> anyhow::Result<Vec<RenderedPost>> {
    let config = &ctx.config;
    info!("Building {:?} into {:?}", config.posts_dir, config.output_dir);

    copy_assets(ctx)?;
    if config.highlight {
        write_highlight_css(ctx)?;
    }

    let sources = discover_posts(&config.posts_dir)?;
    let mut posts = Vec::with_capacity(sources.len());
    for source in sources.iter() {
        let post =
            render_post(ctx, source).with_context(|| format!("while rendering {:?}", source))?;
        posts.push(post);
    }

    // stable: equal dates keep discovery order
    posts.sort_by(sort_post);

    let total = total_pages(posts.len(), config.posts_per_page);
    for (i, window) in posts.chunks(config.posts_per_page).enumerate() {
        render_index(ctx, window, i + 1, total)?;
    }

    render_feed(ctx, &posts)?;

    Ok(posts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Config, TemplateFiles, ThemeFiles};
    use pretty_assertions::assert_eq;
    use regex::Regex;
    use tempfile::TempDir;

    const POST_TEMPLATE: &str = concat!(
        "{{{header}}}<h1>{{title}}</h1><time>{{date}}</time>",
        "{{#if author}}<address>{{author}}</address>{{/if}}",
        "<ul>{{#each tags}}<li>{{this}}</li>{{/each}}</ul>",
        "<main>{{{content}}}</main>{{{footer}}}"
    );
    const INDEX_TEMPLATE: &str = concat!(
        "{{{header}}}{{#each posts}}<a href=\"{{url}}\">{{title}}</a>\n{{/each}}",
        "{{#if prev_page}}<link rel=\"prev\" href=\"{{prev_page}}\">{{/if}}",
        "{{#if next_page}}<link rel=\"next\" href=\"{{next_page}}\">{{/if}}{{{footer}}}"
    );
    const FEED_TEMPLATE: &str = concat!(
        "<rss><title>{{blog_title}}</title><link>{{blog_url}}</link>",
        "<lastBuildDate>{{build_date}}</lastBuildDate>",
        "{{#each posts}}<item>{{title}}</item>{{/each}}</rss>"
    );

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn site() -> (TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("templates/post.html"), POST_TEMPLATE);
        write(&root.join("templates/index.html"), INDEX_TEMPLATE);
        write(&root.join("templates/rss.xml"), FEED_TEMPLATE);
        write(&root.join("theme/header.html"), "<header>H</header>");
        write(&root.join("theme/footer.html"), "<footer>F</footer>");
        std::fs::create_dir_all(root.join("posts")).unwrap();

        let config = Config {
            posts_dir: root.join("posts"),
            output_dir: root.join("public"),
            assets_dir: root.join("assets"),
            templates: TemplateFiles::in_dir(&root.join("templates")),
            theme_files: ThemeFiles::in_dir(&root.join("theme")),
            site_url: "https://blog.test/".to_string(),
            ..Config::default()
        };
        (dir, config)
    }

    fn add_post(config: &Config, name: &str, title: &str, date: &str) {
        write(
            &config.posts_dir.join(name),
            &format!("---\ntitle: {title}\ndate: '{date}'\n---\nBody of {title}.\n"),
        );
    }

    fn read(config: &Config, name: &str) -> String {
        std::fs::read_to_string(config.output_dir.join(name)).unwrap()
    }

    fn build(config: Config) -> Vec<RenderedPost> {
        generate(&Context::new(config).unwrap()).unwrap()
    }

    #[test]
    fn renders_post_page_and_summary() {
        let (_dir, config) = site();
        write(
            &config.posts_dir.join("hello.md"),
            "---\ntitle: Hello\ndate: 2024-01-05\nauthor: Ada\ntags: [rust, web]\n---\nFirst para.\n\nSecond.\n",
        );
        let posts = build(config.clone());

        assert_eq!(
            posts,
            vec![RenderedPost {
                title: "Hello".to_string(),
                snippet: "First para.".to_string(),
                date: "2024-01-05".to_string(),
                author: Some("Ada".to_string()),
                tags: vec!["rust".to_string(), "web".to_string()],
                url: "hello.html".to_string(),
                pub_date: Some("Fri, 05 Jan 2024 00:00:00 GMT".to_string()),
            }]
        );
        let page = read(&config, "hello.html");
        assert!(page.starts_with("<header>H</header>"));
        assert!(page.ends_with("<footer>F</footer>"));
        assert!(page.contains("<address>Ada</address>"));
        assert!(page.contains("<main><p>First para.</p>\n<p>Second.</p>\n</main>"));
    }

    #[test]
    fn metadata_survives_a_render() {
        let (_dir, config) = site();
        write(
            &config.posts_dir.join("trip.md"),
            "---\ntitle: Round Trip\ndate: 2023-11-30\ntags:\n  - a\n  - b\n  - c\n---\nx\n",
        );
        build(config.clone());
        let page = read(&config, "trip.html");

        let title = Regex::new(r"<h1>(.*?)</h1>").unwrap();
        let date = Regex::new(r"<time>(.*?)</time>").unwrap();
        let tag = Regex::new(r"<li>(.*?)</li>").unwrap();
        assert_eq!(&title.captures(&page).unwrap()[1], "Round Trip");
        assert_eq!(&date.captures(&page).unwrap()[1], "2023-11-30");
        let tags: Vec<_> = tag.captures_iter(&page).map(|c| c[1].to_string()).collect();
        assert_eq!(tags, vec!["a", "b", "c"]);
    }

    #[test]
    fn missing_title_is_untitled() {
        let (_dir, config) = site();
        write(&config.posts_dir.join("bare.md"), "Just text, no front matter.\n");
        let posts = build(config.clone());

        assert_eq!(posts[0].title, "Untitled");
        assert_eq!(posts[0].date, "");
        assert_eq!(posts[0].author, None);
        assert!(read(&config, "bare.html").contains("<h1>Untitled</h1>"));
        assert!(!read(&config, "bare.html").contains("<address>"));
    }

    #[test]
    fn default_author_fills_in() {
        let (_dir, mut config) = site();
        config.default_author = Some("Library Staff".to_string());
        add_post(&config, "a.md", "A", "2024-01-01");
        let posts = build(config.clone());
        assert_eq!(posts[0].author.as_deref(), Some("Library Staff"));
        assert!(read(&config, "a.html").contains("<address>Library Staff</address>"));
    }

    #[test]
    fn no_posts_means_no_index() {
        let (_dir, config) = site();
        let posts = build(config.clone());

        assert!(posts.is_empty());
        assert!(!config.output_dir.join("index.html").exists());
        let feed = read(&config, "rss.xml");
        assert!(!feed.contains("<item>"));
    }

    #[test]
    fn ten_posts_fit_one_page() {
        let (_dir, config) = site();
        for i in 0..10 {
            add_post(&config, &format!("p{i:02}.md"), &format!("P{i}"), &format!("2024-01-{:02}", i + 1));
        }
        build(config.clone());

        let index = read(&config, "index.html");
        assert_eq!(index.matches("<a href=").count(), 10);
        assert!(!index.contains("rel=\"prev\""));
        assert!(!index.contains("rel=\"next\""));
        assert!(!config.output_dir.join("index2.html").exists());
    }

    #[test]
    fn eleven_posts_spill_onto_page_two() {
        let (_dir, config) = site();
        for i in 0..11 {
            add_post(&config, &format!("p{i:02}.md"), &format!("P{i}"), &format!("2024-01-{:02}", i + 1));
        }
        build(config.clone());

        let first = read(&config, "index.html");
        assert_eq!(first.matches("<a href=").count(), 10);
        assert!(first.starts_with("<header>H</header><a href=\"p10.html\">P10</a>"));
        assert!(first.contains("<link rel=\"next\" href=\"index2.html\">"));
        assert!(!first.contains("rel=\"prev\""));

        let second = read(&config, "index2.html");
        assert_eq!(second.matches("<a href=").count(), 1);
        assert!(second.contains("<a href=\"p00.html\">P0</a>"));
        assert!(second.contains("<link rel=\"prev\" href=\"index.html\">"));
        assert!(!second.contains("rel=\"next\""));
        assert!(!config.output_dir.join("index3.html").exists());

        let feed = read(&config, "rss.xml");
        assert_eq!(feed.matches("<item>").count(), 11);
        assert!(feed.contains("<item>P10</item><item>P9</item>"));
    }

    #[test]
    fn equal_dates_keep_discovery_order() {
        let (_dir, config) = site();
        add_post(&config, "a.md", "Alpha", "2024-05-01");
        add_post(&config, "b.md", "Beta", "2024-05-01");
        add_post(&config, "c.md", "Gamma", "2024-06-01");
        let posts = build(config.clone());

        let titles: Vec<_> = posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Gamma", "Alpha", "Beta"]);
    }

    #[test]
    fn nested_posts_are_written_flat() {
        let (_dir, config) = site();
        add_post(&config, "2024/deep/nested.md", "Nested", "2024-02-02");
        write(&config.posts_dir.join("notes.txt"), "not a post");
        let posts = build(config.clone());

        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].url, "nested.html");
        assert!(config.output_dir.join("nested.html").exists());
        assert!(!config.output_dir.join("notes.html").exists());
    }

    #[test]
    fn mermaid_and_images_reach_the_page() {
        let (_dir, mut config) = site();
        config.image_base_url = Some("https://cdn.test".to_string());
        write(
            &config.posts_dir.join("diagram.md"),
            "---\ntitle: D\n---\n![shot](img/s.png)\n\n```mermaid\nA-->B\n```\n",
        );
        build(config.clone());

        let page = read(&config, "diagram.html");
        assert!(page.contains("<img src=\"https://cdn.test/img/s.png\" alt=\"shot\" />"));
        assert!(page.contains("<div class=\"mermaid\">A-->B</div>"));
    }

    #[test]
    fn highlight_build_ships_its_stylesheet() {
        let (_dir, mut config) = site();
        config.highlight = true;
        write(
            &config.posts_dir.join("code.md"),
            "---\ntitle: Code\n---\n```rust\nfn main() {}\n```\n",
        );
        build(config.clone());

        assert!(read(&config, "code.html").contains("<div class=\"codehilite\">"));
        assert!(!read(&config, "assets/codehilite.css").is_empty());
    }

    #[test]
    fn diagram_with_blank_lines_reaches_the_page_whole() {
        let (_dir, config) = site();
        write(
            &config.posts_dir.join("flow.md"),
            "---\ntitle: Flow\n---\n```mermaid\nsequenceDiagram\n\n  A->>B: hi\n```\n",
        );
        build(config.clone());

        let page = read(&config, "flow.html");
        assert!(page.contains("<div class=\"mermaid\">sequenceDiagram\n\n  A->>B: hi</div>"));
    }

    #[test]
    fn assets_are_copied_and_overwritten() {
        let (dir, config) = site();
        write(&dir.path().join("assets/css/site.css"), "body {}");
        write(&dir.path().join("assets/logo.svg"), "<svg/>");
        write(&config.output_dir.join("assets/css/site.css"), "stale");
        write(&config.output_dir.join("assets/old.js"), "kept");
        build(config.clone());

        assert_eq!(read(&config, "assets/css/site.css"), "body {}");
        assert_eq!(read(&config, "assets/logo.svg"), "<svg/>");
        assert_eq!(read(&config, "assets/old.js"), "kept");
    }

    #[test]
    fn feed_carries_site_metadata() {
        let (_dir, config) = site();
        add_post(&config, "a.md", "A", "2024-01-01");
        build(config.clone());

        let feed = read(&config, "rss.xml");
        assert!(feed.contains("<title>Lehigh Library Technology Blog</title>"));
        assert!(feed.contains("<link>https://blog.test/</link>"));
        let stamp = Regex::new(r"<lastBuildDate>\w{3}, \d{2} \w{3} \d{4} \d{2}:\d{2}:\d{2} GMT</lastBuildDate>").unwrap();
        assert!(stamp.is_match(&feed));
    }

    #[test]
    fn bad_front_matter_aborts_the_build() {
        let (_dir, config) = site();
        add_post(&config, "good.md", "Good", "2024-01-01");
        write(&config.posts_dir.join("bad.md"), "---\ntitle: never closed\n");
        let err = generate(&Context::new(config).unwrap()).unwrap_err();
        assert!(format!("{err:#}").contains("bad.md"));
    }
}

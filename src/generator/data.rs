use serde::Serialize;

/// Summary of a written post page, consumed by index and feed rendering.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub(crate) struct RenderedPost {
    pub title: String,
    pub snippet: String,
    pub date: String,
    pub author: Option<String>,
    pub tags: Vec<String>,
    /// Path of the page relative to the output directory.
    pub url: String,
    /// RFC-822 form of `date`, when `date` is `%Y-%m-%d`.
    pub pub_date: Option<String>,
}

#[derive(Serialize, Debug)]
pub(super) struct PostPageData<'a> {
    pub site_title: &'a str,
    pub site_url: &'a str,
    pub title: &'a str,
    pub date: &'a str,
    pub author: Option<&'a str>,
    pub content: &'a str,
    pub tags: &'a [String],
    pub header: &'a str,
    pub footer: &'a str,
}

#[derive(Serialize, Debug)]
pub(super) struct IndexPageData<'a> {
    pub site_title: &'a str,
    pub posts: &'a [RenderedPost],
    pub header: &'a str,
    pub footer: &'a str,
    pub page_num: usize,
    pub total_pages: usize,
    pub prev_page: Option<String>,
    pub next_page: Option<String>,
}

#[derive(Serialize, Debug)]
pub(super) struct FeedData<'a> {
    pub posts: &'a [RenderedPost],
    pub blog_title: &'a str,
    pub blog_url: &'a str,
    pub blog_description: &'a str,
    pub build_date: String,
}

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};

use super::data::RenderedPost;

/// RSS (RFC-822) timestamp layout, always in UTC.
const RFC822_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Newest first. Dates compare as plain strings.
pub(super) fn sort_post(a: &RenderedPost, b: &RenderedPost) -> Ordering {
    b.date.cmp(&a.date)
}

pub(super) fn total_pages(post_count: usize, posts_per_page: usize) -> usize {
    post_count.div_ceil(posts_per_page)
}

/// `index.html` for the first page, `index{N}.html` after that.
pub(super) fn index_file_name(page_num: usize) -> String {
    if page_num > 1 {
        format!("index{page_num}.html")
    } else {
        "index.html".to_string()
    }
}

/// File names of the neighbouring index pages, `None` at either end.
pub(super) fn neighbour_pages(page_num: usize, total: usize) -> (Option<String>, Option<String>) {
    let prev = (page_num > 1).then(|| index_file_name(page_num - 1));
    let next = (page_num < total).then(|| index_file_name(page_num + 1));
    (prev, next)
}

pub(super) fn rfc822(time: DateTime<Utc>) -> String {
    time.format(RFC822_FORMAT).to_string()
}

/// Feed date for a `%Y-%m-%d` post date, midnight UTC.
pub(super) fn pub_date(date: &str) -> Option<String> {
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some(rfc822(day.and_hms_opt(0, 0, 0)?.and_utc()))
}

use anyhow::Context;
use handlebars::{handlebars_helper, Handlebars};
use serde_json::Value;

use crate::context::TemplateFiles;

handlebars_helper!(join: |lst: array, sep: str| {
    lst.iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(sep)
});

pub(crate) fn generate_renderer(templates: &TemplateFiles) -> anyhow::Result<Handlebars<'static>> {
    let mut handlebars = Handlebars::new();
    handlebars.register_helper("join", Box::new(join));
    handlebars
        .register_template_file("post", &templates.post)
        .with_context(|| format!("{:?}", templates.post))?;
    handlebars
        .register_template_file("index", &templates.index)
        .with_context(|| format!("{:?}", templates.index))?;
    handlebars
        .register_template_file("rss", &templates.feed)
        .with_context(|| format!("{:?}", templates.feed))?;

    Ok(handlebars)
}

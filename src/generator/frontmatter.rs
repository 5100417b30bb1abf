//! Splitting a post into YAML front matter and a Markdown body.
//!
//! A post may start with a `---` line. Everything up to the next line that
//! is exactly `---` is YAML, everything after it is the body. A post that
//! does not start with `---` has no metadata at all.

use anyhow::{bail, Context};
use serde::{de::Error as _, Deserialize, Deserializer};
use serde_yaml::Value;

const DELIMITER: &str = "---";

/// Metadata as written by the author. Missing fields stay `None`; the
/// generator decides what they default to.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
pub(crate) struct PostMetadata {
    #[serde(default, deserialize_with = "scalar")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "scalar_list")]
    pub tags: Vec<String>,
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_to_string(tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

// `date: 2024-01-05` and `title: 1984` are not YAML strings, accept any scalar.
fn scalar<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(d)? {
        Value::Sequence(_) | Value::Mapping(_) => Err(D::Error::custom("expected a scalar value")),
        v => Ok(scalar_to_string(v)),
    }
}

fn scalar_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(vec![]),
        Value::Sequence(items) => items
            .into_iter()
            .filter(|v| !v.is_null())
            .map(|v| match v {
                Value::Sequence(_) | Value::Mapping(_) => {
                    Err(D::Error::custom("tags must be a list of scalars"))
                }
                v => Ok(scalar_to_string(v).unwrap_or_default()),
            })
            .collect(),
        Value::Mapping(_) => Err(D::Error::custom("tags must be a list")),
        v => Ok(scalar_to_string(v).into_iter().collect()),
    }
}

fn parse_yaml(segment: &str) -> anyhow::Result<PostMetadata> {
    if segment.trim().is_empty() {
        return Ok(PostMetadata::default());
    }
    match serde_yaml::from_str::<Value>(segment).context("invalid front matter")? {
        Value::Null => Ok(PostMetadata::default()),
        value @ Value::Mapping(_) => {
            serde_yaml::from_value(value).context("invalid front matter")
        }
        _ => bail!("front matter must be a YAML mapping"),
    }
}

/// Splits `text` into its metadata and its Markdown body.
pub(crate) fn parse_front_matter(text: &str) -> anyhow::Result<(PostMetadata, &str)> {
    #[derive(Clone, Copy)]
    enum State {
        Detect,
        Yaml { start: usize },
    }

    let mut state = State::Detect;
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let end = offset + line.len();
        match state {
            State::Detect => {
                if !line.starts_with(DELIMITER) {
                    return Ok((PostMetadata::default(), text));
                }
                state = State::Yaml { start: end };
            }
            State::Yaml { start } => {
                if line.trim_end() == DELIMITER {
                    let metadata = parse_yaml(&text[start..offset])?;
                    return Ok((metadata, &text[end..]));
                }
            }
        }
        offset = end;
    }

    match state {
        State::Detect => Ok((PostMetadata::default(), text)),
        State::Yaml { .. } => bail!("front matter is missing its closing `{DELIMITER}`"),
    }
}

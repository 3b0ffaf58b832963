use std::collections::HashMap;

use crate::error::{CorpusError, Result};

/// Parse the value of an HTTP `Link` header into a map of relation name to URL.
///
/// Directives are comma separated and each one must look like
/// `<https://api.github.com/...>; rel="next"`. Commas inside `<...>` or a
/// quoted parameter belong to the directive. A blank header yields an empty
/// map. When a relation appears twice the later URL wins.
pub fn parse_link_header(header: &str) -> Result<HashMap<String, String>> {
    let mut links = HashMap::new();

    if header.trim().is_empty() {
        return Ok(links);
    }

    for directive in split_directives(header) {
        let (url, rel) = parse_directive(directive.trim()).ok_or_else(|| {
            CorpusError::MalformedHeader {
                header: header.to_string(),
            }
        })?;
        links.insert(rel.to_string(), url.to_string());
    }

    Ok(links)
}

/// Split a header at the commas that separate directives
fn split_directives(header: &str) -> Vec<&str> {
    let mut directives = Vec::new();
    let mut start = 0;
    let mut in_url = false;
    let mut in_quotes = false;

    for (i, c) in header.char_indices() {
        match c {
            '<' if !in_quotes => in_url = true,
            '>' if !in_quotes => in_url = false,
            '"' if !in_url => in_quotes = !in_quotes,
            ',' if !in_url && !in_quotes => {
                directives.push(&header[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    directives.push(&header[start..]);
    directives
}

/// Split one `<url>; rel="name"` directive. Extra parameters between the URL
/// and `rel` are tolerated.
fn parse_directive(directive: &str) -> Option<(&str, &str)> {
    let rest = directive.strip_prefix('<')?;
    let (url, params) = rest.split_once('>')?;
    if url.is_empty() {
        return None;
    }

    let params = params.trim_start().strip_prefix(';')?;
    params.split(';').find_map(|param| {
        let value = param.trim().strip_prefix("rel")?;
        let value = value.trim_start().strip_prefix('=')?.trim_start();
        let value = value.strip_prefix('"')?;
        let (rel, _) = value.split_once('"')?;
        (!rel.is_empty()).then_some((url, rel))
    })
}

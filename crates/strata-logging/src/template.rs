//! ---
//! strata_section: "03-persistence-logging"
//! strata_subsection: "module"
//! strata_type: "source"
//! strata_scope: "code"
//! strata_description: "Structured logging core: events, enrichment, sinks, routing."
//! strata_version: "v0.0.0-prealpha"
//! strata_owner: "tbd"
//! ---
//! Message template rendering.
//!
//! Templates carry named holes such as `{UserId}`. A hole may carry a
//! capturing hint (`{@User}`, `{$User}`) or a format suffix (`{Elapsed:0.00}`);
//! both are accepted and ignored for lookup. `{{` and `}}` escape braces.
//! Holes without a matching property, and an unterminated `{`, render verbatim.
use crate::value::Value;

/// Render `template`, resolving each hole through `lookup`.
pub fn render<'a, F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<&'a Value>,
{
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") {
            out.push('{');
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with("}}") {
            out.push('}');
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with('}') {
            out.push('}');
            rest = &tail[1..];
            continue;
        }

        match tail.find('}') {
            Some(end) => {
                let hole = &tail[1..end];
                match hole_name(hole).and_then(&lookup) {
                    Some(value) => out.push_str(&value.to_string()),
                    None => out.push_str(&tail[..=end]),
                }
                rest = &tail[end + 1..];
            }
            None => {
                out.push_str(tail);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

fn hole_name(hole: &str) -> Option<&str> {
    let hole = hole.strip_prefix(['@', '$']).unwrap_or(hole);
    let name = hole.split([':', ',']).next().unwrap_or_default().trim();
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.');
    valid.then_some(name)
}

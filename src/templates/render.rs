//! Placeholder substitution for page templates.
//!
//! Placeholders look like `{{BRAND_NAME}}` (inner whitespace allowed).
//! Substitution is one left-to-right pass: known tokens are replaced,
//! unknown tokens and an unterminated `{{` are copied through untouched
//! so a template that drifted ahead of the gateway still renders.

use std::fmt::Write;

use super::store::TemplateStore;
use crate::routing::LogicalPage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no template bundled for page '{page}'")]
pub struct TemplateMissing {
    pub page: LogicalPage,
}

#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    pub brand_id: &'a str,
    pub brand_display_name: &'a str,
    pub scope: &'a str,
    /// Validated at config load; inserted without escaping.
    pub upstream_base_url: &'a str,
    pub demo_mode: bool,
}

pub fn render(
    store: &TemplateStore,
    page: LogicalPage,
    ctx: &RenderContext<'_>,
) -> Result<String, TemplateMissing> {
    let body = store
        .get(ctx.brand_id, page)
        .ok_or(TemplateMissing { page })?;
    Ok(substitute(body, page, ctx))
}

#[must_use]
pub fn substitute(body: &str, page: LogicalPage, ctx: &RenderContext<'_>) -> String {
    let mut out = String::with_capacity(body.len() + 128);
    let mut rest = body;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };

        let token = &after[..end];
        if token.contains('{') {
            // `{{ {{X}}`: emit the first opener and rescan from the next one.
            out.push_str("{{");
            rest = after;
            continue;
        }

        if !write_token(&mut out, token.trim(), page, ctx) {
            out.push_str(&rest[start..start + 2 + end + 2]);
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}

fn write_token(out: &mut String, token: &str, page: LogicalPage, ctx: &RenderContext<'_>) -> bool {
    match token {
        "BRAND_ID" => escape_html_into(out, ctx.brand_id),
        "BRAND_NAME" => escape_html_into(out, ctx.brand_display_name),
        "SCOPE" => escape_html_into(out, ctx.scope),
        "UPSTREAM_BASE_URL" => out.push_str(ctx.upstream_base_url),
        "DEMO_MODE" => {
            let _ = write!(out, "{}", ctx.demo_mode);
        }
        "PAGE" => out.push_str(page.as_str()),
        _ => return false,
    }
    true
}

pub fn escape_html_into(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RenderContext<'static> {
        RenderContext {
            brand_id: "abc",
            brand_display_name: "Tom & Jerry's <Club>",
            scope: "events",
            upstream_base_url: "https://backend.example/exec?a=1&b=2",
            demo_mode: true,
        }
    }

    #[test]
    fn substitutes_known_tokens() {
        let out = substitute(
            "<h1>{{BRAND_NAME}}</h1><i>{{ SCOPE }}</i>{{DEMO_MODE}}/{{PAGE}}",
            LogicalPage::Poster,
            &ctx(),
        );
        assert_eq!(
            out,
            "<h1>Tom &amp; Jerry&#39;s &lt;Club&gt;</h1><i>events</i>true/poster"
        );
    }

    #[test]
    fn base_url_is_not_escaped() {
        let out = substitute("{{UPSTREAM_BASE_URL}}", LogicalPage::Public, &ctx());
        assert_eq!(out, "https://backend.example/exec?a=1&b=2");
    }

    #[test]
    fn unknown_tokens_are_left_alone() {
        let out = substitute("a {{NEW_THING}} b {{BRAND_ID}}", LogicalPage::Public, &ctx());
        assert_eq!(out, "a {{NEW_THING}} b abc");
    }

    #[test]
    fn unterminated_opener_is_literal() {
        let out = substitute("x {{BRAND_ID", LogicalPage::Public, &ctx());
        assert_eq!(out, "x {{BRAND_ID");
    }

    #[test]
    fn nested_opener_rescans() {
        let out = substitute("{{ {{BRAND_ID}}", LogicalPage::Public, &ctx());
        assert_eq!(out, "{{ abc");
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let c = RenderContext {
            brand_display_name: "{{BRAND_ID}}",
            ..ctx()
        };
        let out = substitute("{{BRAND_NAME}}", LogicalPage::Public, &c);
        assert_eq!(out, "{{BRAND_ID}}");
    }

    #[test]
    fn render_is_deterministic() {
        let mut store = TemplateStore::new();
        store.insert(LogicalPage::Public, "<title>{{BRAND_NAME}}</title>{{SCOPE}}");
        let a = render(&store, LogicalPage::Public, &ctx()).unwrap();
        let b = render(&store, LogicalPage::Public, &ctx()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_template_is_an_error() {
        let store = TemplateStore::new();
        let err = render(&store, LogicalPage::Admin, &ctx()).unwrap_err();
        assert_eq!(err.page, LogicalPage::Admin);
    }
}

//! Local HTML rendering from the pre-built template bundle.
//!
//! [`store::TemplateStore`] holds page templates loaded once at startup;
//! [`render::render`] fills a template's placeholders for one request.
//! [`error_page`] builds the locally generated error pages (404 for
//! unroutable paths, 502 when the bundle is missing a page).

pub mod render;
pub mod store;

pub use render::{render, RenderContext, TemplateMissing};
pub use store::TemplateStore;

use crate::error::ErrorCode;

/// A minimal self-contained error page. Never touches the template
/// bundle, so it works even when the bundle is broken.
#[must_use]
pub fn error_page(code: ErrorCode, message: &str, corr_id: &str) -> String {
    let status = code.status();
    let mut body = String::with_capacity(512);
    body.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>");
    body.push_str(status.as_str());
    body.push(' ');
    body.push_str(status.canonical_reason().unwrap_or("Error"));
    body.push_str("</title>\n</head>\n<body>\n<h1>");
    body.push_str(status.canonical_reason().unwrap_or("Error"));
    body.push_str("</h1>\n<p>");
    render::escape_html_into(&mut body, message);
    body.push_str("</p>\n<p><small>");
    body.push_str(code.as_str());
    body.push_str(" &middot; ref ");
    render::escape_html_into(&mut body, corr_id);
    body.push_str("</small></p>\n</body>\n</html>\n");
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_page_escapes_message() {
        let page = error_page(ErrorCode::NotFound, "<script>x</script>", "cid-1");
        assert!(page.contains("404 Not Found"));
        assert!(page.contains("&lt;script&gt;"));
        assert!(page.contains("NOT_FOUND"));
        assert!(page.contains("cid-1"));
    }
}

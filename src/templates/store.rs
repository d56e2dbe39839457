//! Read-only template bundle, loaded once at startup.
//!
//! The bundle is a directory produced by the front-end build:
//!
//! ```text
//! templates/
//!   public.html          shared page templates, one per logical page
//!   admin.html
//!   abc/poster.html      optional per-brand override
//! ```
//!
//! Files whose stem is not an HTML page name are ignored. Lookups try
//! the brand override first, then the shared template.

use std::collections::HashMap;
use std::path::Path;

use crate::error::FrontdoorError;
use crate::routing::LogicalPage;

#[derive(Debug, Default)]
pub struct TemplateStore {
    shared: HashMap<LogicalPage, String>,
    overrides: HashMap<(String, LogicalPage), String>,
}

impl TemplateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, page: LogicalPage, body: impl Into<String>) {
        self.shared.insert(page, body.into());
    }

    pub fn insert_for_brand(&mut self, brand_id: &str, page: LogicalPage, body: impl Into<String>) {
        self.overrides
            .insert((brand_id.to_ascii_lowercase(), page), body.into());
    }

    #[must_use]
    pub fn get(&self, brand_id: &str, page: LogicalPage) -> Option<&str> {
        self.overrides
            .get(&(brand_id.to_string(), page))
            .or_else(|| self.shared.get(&page))
            .map(String::as_str)
    }

    /// Number of templates, shared and overrides together.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.len() + self.overrides.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shared pages with no template. Requests for these fail with
    /// `TEMPLATE_MISSING` unless a brand override exists.
    #[must_use]
    pub fn missing_pages(&self) -> Vec<LogicalPage> {
        LogicalPage::HTML_PAGES
            .into_iter()
            .filter(|p| !self.shared.contains_key(p))
            .collect()
    }

    pub async fn load_dir(dir: &Path) -> Result<Self, FrontdoorError> {
        let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FrontdoorError::TemplateBundleNotFound {
                    path: dir.to_path_buf(),
                }
            } else {
                FrontdoorError::Io(e)
            }
        })?;

        let mut store = Self::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;

            if file_type.is_dir() {
                let Some(brand_id) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                let brand_id = brand_id.to_ascii_lowercase();
                let mut brand_entries = tokio::fs::read_dir(&path).await?;
                while let Some(brand_entry) = brand_entries.next_entry().await? {
                    let brand_path = brand_entry.path();
                    if let Some(page) = page_for(&brand_path) {
                        let body = tokio::fs::read_to_string(&brand_path).await?;
                        store.insert_for_brand(&brand_id, page, body);
                    }
                }
            } else if let Some(page) = page_for(&path) {
                let body = tokio::fs::read_to_string(&path).await?;
                store.insert(page, body);
            } else {
                tracing::debug!(path = %path.display(), "ignoring non-template file in bundle");
            }
        }

        if store.is_empty() {
            return Err(FrontdoorError::TemplateBundleEmpty {
                path: dir.to_path_buf(),
            });
        }

        let missing = store.missing_pages();
        if !missing.is_empty() {
            tracing::warn!(
                bundle = %dir.display(),
                missing = ?missing,
                "template bundle is missing shared pages"
            );
        }

        Ok(store)
    }
}

fn page_for(path: &Path) -> Option<LogicalPage> {
    if path.extension().and_then(|e| e.to_str()) != Some("html") {
        return None;
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(LogicalPage::from_template_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brand_override_wins() {
        let mut store = TemplateStore::new();
        store.insert(LogicalPage::Poster, "shared");
        store.insert_for_brand("ABC", LogicalPage::Poster, "abc only");
        assert_eq!(store.get("abc", LogicalPage::Poster), Some("abc only"));
        assert_eq!(store.get("root", LogicalPage::Poster), Some("shared"));
        assert_eq!(store.get("root", LogicalPage::Admin), None);
    }

    #[test]
    fn missing_pages_lists_gaps() {
        let mut store = TemplateStore::new();
        store.insert(LogicalPage::Public, "x");
        let missing = store.missing_pages();
        assert!(!missing.contains(&LogicalPage::Public));
        assert!(missing.contains(&LogicalPage::Report));
    }

    #[test]
    fn page_for_requires_html_extension() {
        assert_eq!(page_for(Path::new("t/admin.html")), Some(LogicalPage::Admin));
        assert_eq!(page_for(Path::new("t/admin.txt")), None);
        assert_eq!(page_for(Path::new("t/styles.html")), None);
    }

    #[tokio::test]
    async fn missing_dir_is_reported() {
        let err = TemplateStore::load_dir(Path::new("does/not/exist"))
            .await
            .unwrap_err();
        assert!(matches!(err, FrontdoorError::TemplateBundleNotFound { .. }));
    }

    #[tokio::test]
    async fn loads_example_bundle() {
        let store = TemplateStore::load_dir(Path::new("example/templates"))
            .await
            .unwrap();
        assert!(store.missing_pages().is_empty());
        assert!(store.get("root", LogicalPage::Public).is_some());
    }
}

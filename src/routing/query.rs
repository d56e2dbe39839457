//! Parsed query string with last-value-wins lookup.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Query {
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        let pairs = raw
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default();
        Self { pairs }
    }

    /// Last non-empty value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Sorted, de-duplicated pairs with empty keys and `reserved` keys
    /// dropped. The last value for a repeated key wins.
    #[must_use]
    pub fn normalized(&self, reserved: &[&str]) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        for (k, v) in &self.pairs {
            let key = k.trim();
            if key.is_empty() || reserved.iter().any(|r| r.eq_ignore_ascii_case(key)) {
                continue;
            }
            out.insert(key.to_string(), v.clone());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_value_wins() {
        let q = Query::parse(Some("scope=a&scope=b&empty="));
        assert_eq!(q.get("scope"), Some("b"));
        assert_eq!(q.get("empty"), None);
        assert_eq!(q.get("missing"), None);
    }

    #[test]
    fn decodes_percent_encoding() {
        let q = Query::parse(Some("t=a%2Fb+c"));
        assert_eq!(q.get("t"), Some("a/b c"));
    }

    #[test]
    fn normalized_drops_reserved_and_sorts() {
        let q = Query::parse(Some("z=1&=x&adminKey=s3cret&a=2&a=3"));
        let norm = q.normalized(&["adminkey"]);
        let keys: Vec<_> = norm.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "z"]);
        assert_eq!(norm["a"], "3");
    }
}

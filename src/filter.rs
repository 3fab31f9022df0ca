//! AAAA suppression filter.
//!
//! Holds the set of names whose IPv6 lookups the proxy answers locally
//! instead of forwarding. Matching is exact by design: listing
//! `youtube.com` does not cover `www.youtube.com`.

use std::collections::HashSet;

/// Set of filtered domains with exact-match lookup.
pub struct FilterList {
    domains: HashSet<String>,
}

impl FilterList {
    /// Build a filter list from configured names.
    ///
    /// Each name is normalized to lowercase trailing-dot form, so
    /// `YouTube.com` and `youtube.com.` configure the same entry. Empty
    /// entries are ignored.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let domains = names
            .into_iter()
            .filter_map(|name| {
                let name = name.as_ref().trim();
                if name.is_empty() {
                    return None;
                }
                let mut normalized = name.to_ascii_lowercase();
                if !normalized.ends_with('.') {
                    normalized.push('.');
                }
                Some(normalized)
            })
            .collect();

        Self { domains }
    }

    /// Check whether `name` is filtered.
    ///
    /// `name` must already be in lowercase trailing-dot form, as produced
    /// by `Question::parse`.
    pub fn contains(&self, name: &str) -> bool {
        self.domains.contains(name)
    }

    /// Number of configured names.
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_exact_match() {
        let filter = FilterList::new(["youtube.com", "googlevideo.com"]);

        assert!(filter.contains("youtube.com."));
        assert!(filter.contains("googlevideo.com."));
    }

    #[test]
    fn does_not_match_subdomains() {
        let filter = FilterList::new(["youtube.com"]);

        assert!(!filter.contains("www.youtube.com."));
        assert!(!filter.contains("m.youtube.com."));
    }

    #[test]
    fn does_not_match_parent_or_sibling() {
        let filter = FilterList::new(["www.youtube.com"]);

        assert!(!filter.contains("youtube.com."));
        assert!(!filter.contains("m.youtube.com."));
    }

    #[test]
    fn new_normalizes_case_and_trailing_dot() {
        let filter = FilterList::new(["YouTube.COM", "googlevideo.com."]);

        assert_eq!(filter.len(), 2);
        assert!(filter.contains("youtube.com."));
        assert!(filter.contains("googlevideo.com."));
    }

    #[test]
    fn new_skips_empty_entries() {
        let filter = FilterList::new(["", "  ", "youtube.com"]);

        assert_eq!(filter.len(), 1);
    }

    #[test]
    fn empty_list_matches_nothing() {
        let filter = FilterList::new(Vec::<String>::new());

        assert!(filter.is_empty());
        assert!(!filter.contains("youtube.com."));
    }
}

//! Full-text-ish search over published posts

use serde::Deserialize;

use super::blog::{split_tags, BLOG_PAGE_DEFAULT, BLOG_PAGE_MAX};
use super::validation::required_text;
use super::{Pagination, PaginationParams, ValidationError, ValidationErrors};

const MAX_QUERY_LEN: usize = 200;

const TITLE_WEIGHT: u32 = 10;
const DESCRIPTION_WEIGHT: u32 = 5;
const TAG_WEIGHT: u32 = 3;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub tags: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub q: String,
    pub tags: Vec<String>,
    pub page: Pagination,
}

impl SearchParams {
    pub fn validate(self) -> Result<SearchQuery, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let q = match self.q.as_deref() {
            Some(q) => errors.check(required_text("q", q, MAX_QUERY_LEN)),
            None => {
                errors.push(ValidationError::Empty { field: "q" });
                None
            }
        };
        let page = Pagination::from_params(
            &PaginationParams {
                page: self.page,
                limit: self.limit,
            },
            BLOG_PAGE_DEFAULT,
            BLOG_PAGE_MAX,
        );
        let page = match page {
            Ok(page) => page,
            Err(page_errors) => {
                for err in page_errors.errors() {
                    errors.push(err.clone());
                }
                Pagination::new(1, BLOG_PAGE_DEFAULT, BLOG_PAGE_MAX)
            }
        };
        errors.finish()?;

        Ok(SearchQuery {
            q: q.unwrap_or_default(),
            tags: split_tags(self.tags.as_deref()),
            page,
        })
    }
}

/// Score a hit in `0.0..=1.0`: title +10, description +5, any tag +3, over 10.
///
/// Matching is case-insensitive substring containment.
pub fn relevance_score(query: &str, title: &str, description: Option<&str>, tags: &[String]) -> f64 {
    let needle = query.to_lowercase();
    let contains = |hay: &str| hay.to_lowercase().contains(&needle);

    let mut score = 0;
    if contains(title) {
        score += TITLE_WEIGHT;
    }
    if description.is_some_and(contains) {
        score += DESCRIPTION_WEIGHT;
    }
    if tags.iter().any(|t| contains(t)) {
        score += TAG_WEIGHT;
    }
    (f64::from(score) / f64::from(TITLE_WEIGHT)).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_required() {
        let errors = SearchParams::default().validate().unwrap_err();
        assert_eq!(errors.by_field()["q"], vec!["q is required"]);

        let errors = SearchParams {
            q: Some("x".repeat(201)),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert!(errors.by_field().contains_key("q"));
    }

    #[test]
    fn parses_tags_and_page() {
        let query = SearchParams {
            q: Some(" rust ".into()),
            page: Some(2),
            limit: Some(5),
            tags: Some("web,async".into()),
        }
        .validate()
        .unwrap();
        assert_eq!(query.q, "rust");
        assert_eq!(query.tags, vec!["web", "async"]);
        assert_eq!(query.page.offset(), 5);
    }

    #[test]
    fn scores() {
        let tags = vec!["Rust".to_owned()];
        assert_eq!(relevance_score("rust", "Learning Rust", None, &[]), 1.0);
        assert_eq!(relevance_score("rust", "Other", Some("all about RUST"), &[]), 0.5);
        assert_eq!(relevance_score("rust", "Other", None, &tags), 0.3);
        assert_eq!(relevance_score("rust", "Other", Some("rust"), &tags), 0.8);
        assert_eq!(relevance_score("rust", "Rust", Some("rust"), &tags), 1.0);
        assert_eq!(relevance_score("go", "Other", None, &tags), 0.0);
    }
}

use urlencoding::encode;

use crate::error::{CorpusError, Result};

/// Default GitHub REST API endpoint for repository search
pub const GITHUB_SEARCH_URL: &str = "https://api.github.com/search/repositories";

/// Default host serving repository archives
pub const GITHUB_BASE: &str = "https://github.com";

/// Largest page size the search API accepts
pub const MAX_PAGE_SIZE: u32 = 100;

/// Builds search and archive URLs against a (possibly substituted) GitHub host.
#[derive(Debug, Clone)]
pub struct SearchQueryBuilder {
    search_endpoint: String,
    archive_host: String,
}

impl Default for SearchQueryBuilder {
    fn default() -> Self {
        Self::new(GITHUB_SEARCH_URL, GITHUB_BASE)
    }
}

impl SearchQueryBuilder {
    /// Create a builder for the given search endpoint and archive host
    pub fn new(search_endpoint: impl Into<String>, archive_host: impl Into<String>) -> Self {
        Self {
            search_endpoint: search_endpoint.into().trim_end_matches('/').to_string(),
            archive_host: archive_host.into().trim_end_matches('/').to_string(),
        }
    }

    /// URL for one page of repositories written in `language`, most starred first.
    ///
    /// Parameters always appear as `q`, `sort`, `per_page`, `page`.
    pub fn build_search_url(&self, language: &str, page: u32, page_size: u32) -> Result<String> {
        if page < 1 {
            return Err(CorpusError::InvalidArgument(
                "pages must be greater than 0".to_string(),
            ));
        }
        if page_size < 1 {
            return Err(CorpusError::InvalidArgument(
                "page size must be greater than 0".to_string(),
            ));
        }

        Ok(format!(
            "{}?q=language:{}&sort=stars&per_page={}&page={}",
            self.search_endpoint,
            encode(language),
            page_size,
            page
        ))
    }

    /// URL of the zip archive of `owner/repo` at `git_ref`
    pub fn build_archive_url(&self, owner: &str, repo: &str, git_ref: &str) -> String {
        // Refs such as `release/1.x` keep their slashes
        let git_ref = git_ref
            .split('/')
            .map(|segment| encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");

        format!(
            "{}/{}/{}/archive/{}.zip",
            self.archive_host,
            encode(owner),
            encode(repo),
            git_ref
        )
    }
}

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::credentials::CredentialProvider;
use crate::error::{CorpusError, Result};
use crate::link_header::parse_link_header;
use crate::query::{SearchQueryBuilder, MAX_PAGE_SIZE};
use crate::repository::RepositoryReference;
use crate::transport::{HttpResponse, HttpTransport};

/// Media type of the versioned GitHub REST API
pub const ACCEPT_HEADER: &str = "application/vnd.github.v3+json";

/// The search API stops at 1000 results, i.e. ten full pages
pub const DEFAULT_MAX_REQUESTS: u32 = 10;

/// Where the searcher is in its walk over the result pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearcherState {
    /// Nothing buffered; the next call fetches a page
    Idle,
    /// A page request is in flight
    Fetching,
    /// Results from the last page are waiting to be handed out
    Buffered,
    /// No more pages, no request budget left, or a fetch failed
    Exhausted,
}

/// Knobs for a single search walk
#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    /// Results per page, clamped to `1..=100`
    pub page_size: u32,
    /// Upper bound on the number of page requests
    pub max_requests: u32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            max_requests: DEFAULT_MAX_REQUESTS,
        }
    }
}

#[derive(Deserialize)]
struct SearchPage {
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    name: Option<String>,
    full_name: Option<String>,
    owner: Option<SearchOwner>,
    default_branch: Option<String>,
}

#[derive(Deserialize)]
struct SearchOwner {
    login: String,
}

impl SearchItem {
    fn into_reference(self) -> Option<RepositoryReference> {
        let from_fields = match (self.owner, self.name) {
            (Some(owner), Some(name)) => Some((owner.login, name)),
            _ => None,
        };
        let (owner, name) = from_fields.or_else(|| {
            let full_name = self.full_name?;
            let (owner, name) = full_name.split_once('/')?;
            Some((owner.to_string(), name.to_string()))
        })?;

        Some(RepositoryReference::new(owner, name, self.default_branch))
    }
}

/// Cursor over the repository search results for one language.
///
/// Pages are fetched lazily, one request per page, following the `next`
/// relation of each response's `Link` header. HTTP and transport failures end
/// the walk quietly: whatever was already delivered stands and the searcher
/// reports the end of the sequence. A malformed `Link` header is the one
/// error surfaced to the caller.
pub struct GitHubSearcher {
    transport: Arc<dyn HttpTransport>,
    credentials: Arc<dyn CredentialProvider>,
    language: String,
    next_url: Option<String>,
    requests_remaining: u32,
    buffer: VecDeque<RepositoryReference>,
    state: SearcherState,
}

impl GitHubSearcher {
    /// Create a searcher positioned before the first page
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        credentials: Arc<dyn CredentialProvider>,
        queries: &SearchQueryBuilder,
        language: &str,
        options: SearchOptions,
    ) -> Result<Self> {
        let page_size = options.page_size.clamp(1, MAX_PAGE_SIZE);
        let first_page = queries.build_search_url(language, 1, page_size)?;

        Ok(GitHubSearcher {
            transport,
            credentials,
            language: language.to_string(),
            next_url: Some(first_page),
            requests_remaining: options.max_requests,
            buffer: VecDeque::new(),
            state: SearcherState::Idle,
        })
    }

    pub fn state(&self) -> SearcherState {
        self.state
    }

    /// Page requests this searcher may still issue
    pub fn requests_remaining(&self) -> u32 {
        self.requests_remaining
    }

    /// Next repository in API order, fetching a page if the buffer is empty.
    ///
    /// `Ok(None)` marks the end of the sequence; every later call returns it too.
    pub async fn produce_next(&mut self) -> Result<Option<RepositoryReference>> {
        if let Some(repo) = self.pop_buffered() {
            return Ok(Some(repo));
        }
        if self.state == SearcherState::Exhausted {
            return Ok(None);
        }

        let url = match self.next_url.take() {
            Some(url) if self.requests_remaining > 0 => url,
            Some(_) => {
                debug!("Request budget spent for '{}'", self.language);
                self.state = SearcherState::Exhausted;
                return Ok(None);
            }
            None => {
                debug!("No more results for '{}'", self.language);
                self.state = SearcherState::Exhausted;
                return Ok(None);
            }
        };

        self.state = SearcherState::Fetching;
        self.requests_remaining -= 1;

        match self.request_next_page(&url).await {
            Ok(()) => {}
            Err(e @ CorpusError::MalformedHeader { .. }) => {
                self.state = SearcherState::Exhausted;
                return Err(e);
            }
            Err(e) => {
                warn!("Search for '{}' stopped early: {}", self.language, e);
                self.next_url = None;
            }
        }

        match self.pop_buffered() {
            Some(repo) => Ok(Some(repo)),
            None => {
                self.state = SearcherState::Exhausted;
                Ok(None)
            }
        }
    }

    /// The remaining results as a stream; dropping it leaves the searcher usable.
    pub fn stream(&mut self) -> impl Stream<Item = Result<RepositoryReference>> + '_ {
        stream::try_unfold(self, |searcher| async move {
            let next = searcher.produce_next().await;
            next.map(|repo| repo.map(|repo| (repo, searcher)))
        })
    }

    /// Up to `quantity` repositories in API order.
    ///
    /// Stops early when the results run out or a page fetch fails. No request is
    /// made once `quantity` results have been produced.
    pub async fn collect(&mut self, quantity: usize) -> Result<Vec<RepositoryReference>> {
        let language = self.language.clone();
        let repositories: Vec<_> = self.stream().take(quantity).try_collect().await?;

        info!(
            "Collected {} of {} requested repositories for '{}'",
            repositories.len(),
            quantity,
            language
        );
        Ok(repositories)
    }

    fn pop_buffered(&mut self) -> Option<RepositoryReference> {
        let repo = self.buffer.pop_front()?;
        self.state = if self.buffer.is_empty() {
            SearcherState::Idle
        } else {
            SearcherState::Buffered
        };
        Some(repo)
    }

    /// Fetch one page into the buffer and advance the cursor
    async fn request_next_page(&mut self, url: &str) -> Result<()> {
        let mut headers = vec![("Accept", ACCEPT_HEADER.to_string())];
        if let Some(token) = self.credentials.token() {
            headers.push(("Authorization", format!("token {}", token)));
        }

        let response = self.transport.get(url, &headers).await?;
        self.observe_rate_limit(&response);

        if !response.status.is_success() {
            return Err(CorpusError::fetch(
                url,
                format!("API error: {}", response.status),
            ));
        }

        let page: SearchPage = serde_json::from_slice(&response.body)
            .map_err(|e| CorpusError::fetch(url, format!("unexpected search payload: {}", e)))?;

        let next_url = match response.header("Link") {
            Some(link) => parse_link_header(link)?.remove("next"),
            None => None,
        };

        let mut found = 0;
        for item in page.items {
            match item.into_reference() {
                Some(repo) => {
                    self.buffer.push_back(repo);
                    found += 1;
                }
                None => warn!("Skipping search result without owner and name"),
            }
        }

        info!(
            "Fetched {} repositories for '{}' ({} requests left)",
            found, self.language, self.requests_remaining
        );
        self.next_url = next_url;
        Ok(())
    }

    /// Shrink the request budget to what the API says is left
    fn observe_rate_limit(&mut self, response: &HttpResponse) {
        let Some(remaining) = response
            .header("X-RateLimit-Remaining")
            .and_then(|v| v.parse::<u32>().ok())
        else {
            return;
        };

        if remaining < self.requests_remaining {
            debug!("API allows {} more requests", remaining);
            self.requests_remaining = remaining;
        }

        if remaining == 0 && !response.status.is_success() {
            let wait_secs = response
                .header("X-RateLimit-Reset")
                .and_then(|v| v.parse::<i64>().ok())
                .map(|reset| (reset - Utc::now().timestamp()).max(0));

            match wait_secs {
                Some(secs) => warn!(
                    "Rate limit reached while searching '{}'; resets in {} seconds",
                    self.language, secs
                ),
                None => warn!("Rate limit reached while searching '{}'", self.language),
            }
        }
    }
}

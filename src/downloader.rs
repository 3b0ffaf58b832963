use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info, warn};

use crate::archive::ArchiveFilter;
use crate::credentials::CredentialProvider;
use crate::error::{CorpusError, Result};
use crate::github_searcher::{GitHubSearcher, SearchOptions, ACCEPT_HEADER};
use crate::query::SearchQueryBuilder;
use crate::repository::{CorpusIndex, RepositoryReference};
use crate::transport::HttpTransport;

/// Content types GitHub uses for archive downloads
const ZIP_CONTENT_TYPES: [&str; 2] = ["application/zip", "application/x-zip-compressed"];

/// A repository that could not be downloaded or extracted
#[derive(Debug, Clone)]
pub struct RepositoryFailure {
    pub repository: RepositoryReference,
    pub reason: String,
}

/// Outcome of one corpus run
#[derive(Debug, Clone, Default)]
pub struct DownloadReport {
    /// Where `index.json` was written
    pub index_path: PathBuf,
    /// Repositories in the index
    pub indexed: usize,
    /// Repositories whose archive was fetched and filtered
    pub extracted: usize,
    /// Valid files written across all repositories
    pub files_written: usize,
    pub failures: Vec<RepositoryFailure>,
}

/// Searches for repositories, records them in an index and keeps the valid
/// source files of each one.
///
/// Everything runs one step at a time: a single request is in flight at any
/// moment, and repositories are processed in index order.
pub struct CorpusDownloader {
    transport: Arc<dyn HttpTransport>,
    credentials: Arc<dyn CredentialProvider>,
    queries: SearchQueryBuilder,
    filter: ArchiveFilter,
    options: SearchOptions,
    show_progress: bool,
}

impl CorpusDownloader {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        credentials: Arc<dyn CredentialProvider>,
        filter: ArchiveFilter,
    ) -> Self {
        Self {
            transport,
            credentials,
            queries: SearchQueryBuilder::default(),
            filter,
            options: SearchOptions::default(),
            show_progress: false,
        }
    }

    /// Talk to a different API endpoint and archive host
    pub fn with_queries(mut self, queries: SearchQueryBuilder) -> Self {
        self.queries = queries;
        self
    }

    pub fn with_search_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    /// Draw a progress bar while repositories are processed
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Build a corpus of up to `quantity` repositories written in `language` under `root`.
    ///
    /// Failing to create `root` or to write the index aborts the run. Problems
    /// with individual repositories are collected in the report instead.
    pub async fn download_corpus(
        &self,
        language: &str,
        root: &Path,
        quantity: usize,
    ) -> Result<DownloadReport> {
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| CorpusError::io(root, e))?;

        let mut searcher = GitHubSearcher::new(
            self.transport.clone(),
            self.credentials.clone(),
            &self.queries,
            language,
            self.options,
        )?;
        let index = CorpusIndex::new(searcher.collect(quantity).await?);
        let index_path = index.write(root).await?;

        let mut report = DownloadReport {
            index_path,
            indexed: index.len(),
            ..DownloadReport::default()
        };

        let pb = self.progress_bar(index.len());
        for repo in &index {
            pb.set_message(repo.full_name());

            match self.download_repo(repo, root).await {
                Ok(written) => {
                    report.extracted += 1;
                    report.files_written += written;
                }
                Err(e) => {
                    warn!("Skipping {}: {}", repo.full_name(), e);
                    report.failures.push(RepositoryFailure {
                        repository: repo.clone(),
                        reason: e.to_string(),
                    });
                }
            }

            pb.inc(1);
        }
        pb.finish_and_clear();

        info!(
            "Corpus complete: {} files from {}/{} repositories ({} failed)",
            report.files_written,
            report.extracted,
            report.indexed,
            report.failures.len()
        );
        Ok(report)
    }

    /// Fetch one repository's archive and keep its valid files
    async fn download_repo(&self, repo: &RepositoryReference, root: &Path) -> Result<usize> {
        let repo_dir = repo.storage_path(root)?;
        tokio::fs::create_dir_all(&repo_dir)
            .await
            .map_err(|e| CorpusError::io(&repo_dir, e))?;

        let archive = self.fetch_archive(repo).await?;

        let filter = self.filter.clone();
        tokio::task::spawn_blocking(move || filter.extract_valid(&archive, &repo_dir))
            .await
            .map_err(|e| {
                error!("Extraction task for {} failed: {}", repo.full_name(), e);
                CorpusError::Archive(format!("extraction task failed: {}", e))
            })?
    }

    async fn fetch_archive(&self, repo: &RepositoryReference) -> Result<Vec<u8>> {
        let url =
            self.queries
                .build_archive_url(repo.owner(), repo.name(), repo.default_branch());
        debug!("Downloading {}", url);

        let response = self
            .transport
            .get(&url, &[("Accept", ACCEPT_HEADER.to_string())])
            .await?;
        if !response.status.is_success() {
            return Err(CorpusError::fetch(&url, format!("HTTP {}", response.status)));
        }

        let content_type = response.header("Content-Type").unwrap_or_default();
        let is_zip = ZIP_CONTENT_TYPES
            .iter()
            .any(|expected| content_type.starts_with(expected));
        if !is_zip {
            return Err(CorpusError::fetch(
                &url,
                format!("unexpected content type {:?}", content_type),
            ));
        }

        Ok(response.body)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len as u64);
        match ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {wide_msg}")
        {
            Ok(style) => pb.set_style(style.progress_chars("=>-")),
            Err(e) => debug!("Falling back to default progress style: {}", e),
        }
        pb
    }
}

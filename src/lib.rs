//! # GitHub Corpus
//!
//! A Rust library for building a corpus of syntactically valid source code
//! from the most starred GitHub repositories in a language.
//!
//! ## Main Components
//!
//! - [`GitHubSearcher`]: walks the paged repository search, following `Link` headers
//! - [`ArchiveFilter`]: keeps the archive entries that parse as valid source
//! - [`CorpusDownloader`]: runs the search, writes `index.json` and filters every archive
//! - [`Args`]: command line arguments of the `github-corpus` binary
//!
//! HTTP, archive reading, syntax validation and credentials sit behind the
//! [`HttpTransport`], [`ArchiveReader`], [`SyntaxValidator`] and
//! [`CredentialProvider`] traits.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use github_corpus::{
//!     ArchiveFilter, CorpusDownloader, EnvToken, ReqwestTransport, SourceLanguage,
//!     TreeSitterValidator,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let filter = ArchiveFilter::zip(TreeSitterValidator::new(SourceLanguage::Python));
//!     let downloader = CorpusDownloader::new(
//!         Arc::new(ReqwestTransport::new()?),
//!         Arc::new(EnvToken::default()),
//!         filter,
//!     );
//!
//!     let report = downloader
//!         .download_corpus("python", Path::new("./corpus"), 10)
//!         .await?;
//!     println!("kept {} files", report.files_written);
//!     Ok(())
//! }
//! ```

mod archive;
mod args;
mod credentials;
mod downloader;
mod error;
mod github_searcher;
mod link_header;
mod query;
mod repository;
mod transport;
mod validator;

// Re-export main components for documentation and external use
pub use crate::archive::{mirrored_path, ArchiveEntry, ArchiveFilter, ArchiveReader, ZipArchiveReader};
pub use crate::args::Args;
pub use crate::credentials::{
    Anonymous, CredentialChain, CredentialProvider, EnvToken, StaticToken, TokenFile,
    TOKEN_ENV_VAR,
};
pub use crate::downloader::{CorpusDownloader, DownloadReport, RepositoryFailure};
pub use crate::error::{CorpusError, Result};
pub use crate::github_searcher::{
    GitHubSearcher, SearchOptions, SearcherState, ACCEPT_HEADER, DEFAULT_MAX_REQUESTS,
};
pub use crate::link_header::parse_link_header;
pub use crate::query::{SearchQueryBuilder, GITHUB_BASE, GITHUB_SEARCH_URL, MAX_PAGE_SIZE};
pub use crate::repository::{CorpusIndex, RepositoryReference, DEFAULT_BRANCH, INDEX_FILE};
pub use crate::transport::{HttpResponse, HttpTransport, ReqwestTransport};
pub use crate::validator::{SourceLanguage, SyntaxValidator, TreeSitterValidator};

use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use dotenv::dotenv;
use tracing::{error, info, warn};

use github_corpus::{
    ArchiveFilter, Args, CorpusDownloader, CredentialChain, CredentialProvider, EnvToken,
    ReqwestTransport, SearchOptions, SourceLanguage, StaticToken, TokenFile,
    TreeSitterValidator,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize the tracing logger
    tracing_subscriber::fmt::init();

    dotenv().ok();

    let args = Args::parse();

    let language: SourceLanguage = args.language.parse()?;

    let mut credentials = CredentialChain::new();
    if let Some(token) = &args.token {
        credentials = credentials.with(StaticToken(token.clone()));
    }
    credentials = credentials.with(EnvToken::default());
    match args.token_file.clone().map(TokenFile).or_else(TokenFile::in_home_dir) {
        Some(file) => credentials = credentials.with(file),
        None => warn!("No home directory found; skipping token file lookup"),
    }
    if credentials.token().is_none() {
        warn!("No GitHub token found; searching unauthenticated with a lower rate limit");
    }

    let downloader = CorpusDownloader::new(
        Arc::new(ReqwestTransport::new()?),
        Arc::new(credentials),
        ArchiveFilter::zip(TreeSitterValidator::new(language)),
    )
    .with_search_options(SearchOptions {
        page_size: args.per_page,
        max_requests: args.max_requests,
    })
    .with_progress(!args.quiet);

    info!(
        "Downloading up to {} {} repositories into {}",
        args.quantity,
        language,
        args.directory.display()
    );

    let report = match downloader
        .download_corpus(language.search_name(), &args.directory, args.quantity)
        .await
    {
        Ok(report) => report,
        Err(e) => {
            error!("Corpus download failed: {}", e);
            return Err(e.into());
        }
    };

    for failure in &report.failures {
        warn!("{}: {}", failure.repository.full_name(), failure.reason);
    }
    info!(
        "Saved {} files from {} repositories; index at {}",
        report.files_written,
        report.extracted,
        report.index_path.display()
    );
    Ok(())
}

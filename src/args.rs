use std::path::PathBuf;

use clap::Parser;

/// Download a corpus of syntactically valid source files from the most starred
/// GitHub repositories written in a given language.
#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about,
    long_about = "Searches GitHub for the most starred repositories in a language, downloads each repository's archive and keeps only the files that parse as valid source."
)]
pub struct Args {
    /// Language to search for and validate against (python, java, javascript, rust).
    pub language: String,

    /// Directory the corpus is written to.
    #[clap(default_value = "./corpus")]
    pub directory: PathBuf,

    /// Number of repositories to download.
    #[clap(default_value_t = 1024)]
    pub quantity: usize,

    /// GitHub API token. Falls back to GITHUB_TOKEN, then to the token file.
    #[clap(short, long)]
    pub token: Option<String>,

    /// File whose first line is a GitHub API token. Defaults to ~/.github-token.
    #[clap(long, value_name = "PATH")]
    pub token_file: Option<PathBuf>,

    /// Maximum number of search requests to issue.
    #[clap(short = 'r', long, value_name = "NUM", default_value_t = 10)]
    pub max_requests: u32,

    /// Search results requested per page (at most 100).
    #[clap(short = 'p', long, value_name = "NUM", default_value_t = 100)]
    pub per_page: u32,

    /// Hide the progress bar.
    #[clap(short, long)]
    pub quiet: bool,
}

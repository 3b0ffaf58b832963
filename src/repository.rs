use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CorpusError, Result};

/// Branch assumed when the search API omits `default_branch`
pub const DEFAULT_BRANCH: &str = "master";

/// Name of the index file written at the corpus root
pub const INDEX_FILE: &str = "index.json";

/// One remote repository found by the search.
///
/// Two references are equal when owner and name match, whatever the branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryReference {
    owner: String,
    name: String,
    #[serde(default = "fallback_branch")]
    default_branch: String,
}

fn fallback_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

impl RepositoryReference {
    /// Create a reference; `None` for the branch falls back to [`DEFAULT_BRANCH`]
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        default_branch: Option<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            default_branch: default_branch.unwrap_or_else(fallback_branch),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_branch(&self) -> &str {
        &self.default_branch
    }

    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Directory holding this repository's files under `root`.
    ///
    /// Fails when owner or name could escape the owner directory.
    pub fn storage_path(&self, root: &Path) -> Result<PathBuf> {
        for component in [&self.owner, &self.name] {
            if !is_safe_component(component) {
                return Err(CorpusError::InvalidArgument(format!(
                    "{:?} is not usable as a directory name",
                    component
                )));
            }
        }
        Ok(root.join(&self.owner).join(&self.name))
    }
}

fn is_safe_component(component: &str) -> bool {
    !component.is_empty()
        && component != "."
        && component != ".."
        && !component.contains(['/', '\\', '\0'])
}

impl PartialEq for RepositoryReference {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner && self.name == other.name
    }
}

impl Eq for RepositoryReference {}

impl Hash for RepositoryReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.owner.hash(state);
        self.name.hash(state);
    }
}

/// Ordered list of repositories selected for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorpusIndex {
    repositories: Vec<RepositoryReference>,
}

impl CorpusIndex {
    pub fn new(repositories: Vec<RepositoryReference>) -> Self {
        Self { repositories }
    }

    pub fn repositories(&self) -> &[RepositoryReference] {
        &self.repositories
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    /// Path of the index file under `root`
    pub fn path(root: &Path) -> PathBuf {
        root.join(INDEX_FILE)
    }

    /// Write the index to `<root>/index.json`, replacing any previous one
    pub async fn write(&self, root: &Path) -> Result<PathBuf> {
        let path = Self::path(root);
        let json = serde_json::to_vec_pretty(&self.repositories)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| CorpusError::io(&path, e))?;

        info!("Saved index of {} repositories to {}", self.len(), path.display());
        Ok(path)
    }

    /// Read an index previously written by [`CorpusIndex::write`]
    pub async fn load(root: &Path) -> Result<Self> {
        let path = Self::path(root);
        let json = tokio::fs::read(&path)
            .await
            .map_err(|e| CorpusError::io(&path, e))?;
        Ok(Self::new(serde_json::from_slice(&json)?))
    }
}

impl<'a> IntoIterator for &'a CorpusIndex {
    type Item = &'a RepositoryReference;
    type IntoIter = std::slice::Iter<'a, RepositoryReference>;

    fn into_iter(self) -> Self::IntoIter {
        self.repositories.iter()
    }
}

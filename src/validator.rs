use std::fmt;
use std::str::FromStr;

use tree_sitter::{Language, Parser};

use crate::error::{CorpusError, Result};

/// Decides whether a file's content is valid source.
///
/// Garbage, binary or badly formed input is a normal `Ok(false)`. `Err` is
/// reserved for the validator itself being broken.
pub trait SyntaxValidator: Send + Sync {
    fn parses(&self, source: &[u8]) -> Result<bool>;
}

impl<F> SyntaxValidator for F
where
    F: Fn(&[u8]) -> bool + Send + Sync,
{
    fn parses(&self, source: &[u8]) -> Result<bool> {
        Ok(self(source))
    }
}

/// Languages with a bundled grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    Python,
    Java,
    JavaScript,
    Rust,
}

impl SourceLanguage {
    pub fn grammar(self) -> Language {
        match self {
            SourceLanguage::Python => tree_sitter_python::LANGUAGE.into(),
            SourceLanguage::Java => tree_sitter_java::LANGUAGE.into(),
            SourceLanguage::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            SourceLanguage::Rust => tree_sitter_rust::LANGUAGE.into(),
        }
    }

    /// Name understood by the search API's `language:` qualifier
    pub fn search_name(self) -> &'static str {
        match self {
            SourceLanguage::Python => "python",
            SourceLanguage::Java => "java",
            SourceLanguage::JavaScript => "javascript",
            SourceLanguage::Rust => "rust",
        }
    }
}

impl FromStr for SourceLanguage {
    type Err = CorpusError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "python" | "py" => Ok(SourceLanguage::Python),
            "java" => Ok(SourceLanguage::Java),
            "javascript" | "js" => Ok(SourceLanguage::JavaScript),
            "rust" | "rs" => Ok(SourceLanguage::Rust),
            _ => Err(CorpusError::UnsupportedLanguage(s.to_string())),
        }
    }
}

impl fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.search_name())
    }
}

/// Accepts content that a tree-sitter grammar parses without error nodes
#[derive(Debug, Clone, Copy)]
pub struct TreeSitterValidator {
    language: SourceLanguage,
}

impl TreeSitterValidator {
    pub fn new(language: SourceLanguage) -> Self {
        Self { language }
    }

    pub fn language(&self) -> SourceLanguage {
        self.language
    }
}

impl SyntaxValidator for TreeSitterValidator {
    fn parses(&self, source: &[u8]) -> Result<bool> {
        let Ok(text) = std::str::from_utf8(source) else {
            return Ok(false);
        };
        if text.contains('\0') {
            return Ok(false);
        }

        let mut parser = Parser::new();
        parser
            .set_language(&self.language.grammar())
            .map_err(|e| CorpusError::Validator(format!("{} grammar: {}", self.language, e)))?;

        let tree = parser.parse(text, None).ok_or_else(|| {
            CorpusError::Validator(format!("{} parser produced no tree", self.language))
        })?;

        Ok(!tree.root_node().has_error())
    }
}

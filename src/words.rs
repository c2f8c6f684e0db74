//! Word pool used to deal boards
//!
//! The pool is a newline-delimited list of words. Loading normalizes every
//! entry to upper case and removes blank lines and duplicates, so a board can
//! always draw distinct words.

use std::sync::{Arc, LazyLock};

use itertools::Itertools;

static DEFAULT_WORDS: LazyLock<WordPool> =
    LazyLock::new(|| WordPool::from_lines(include_str!("../words/default.txt")));

/// An immutable, shareable list of distinct upper-case words
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordPool {
    words: Arc<[String]>,
}

impl WordPool {
    /// Builds a pool from newline-delimited text
    pub fn from_lines(data: &str) -> Self {
        Self {
            words: data
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_uppercase)
                .unique()
                .collect(),
        }
    }

    /// Builds a pool from an iterator of words
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_lines(&words.into_iter().map(|w| w.as_ref().to_owned()).join("\n"))
    }

    /// Number of distinct words in the pool
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether the pool holds no words at all
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Iterates over the words in load order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(String::as_str)
    }
}

impl Default for WordPool {
    /// The word list bundled with the crate
    fn default() -> Self {
        DEFAULT_WORDS.clone()
    }
}

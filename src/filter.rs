use crate::error::Result;
use crate::files;

use std::collections::HashSet;
use std::io::BufRead;
use log::info;

/// Optional allow-list. An absent list keeps everything.
#[derive(Debug, Default, Clone)]
pub struct Filter {
    words: Option<HashSet<String>>,
}

impl Filter {

    pub fn keep_all() -> Self {
        Self { words: None }
    }

    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { words: Some(words.into_iter().map(Into::into).collect()) }
    }

    /// Reads one word per line, trailing newline stripped.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => return Ok(Self::keep_all()),
        };
        let reader = files::open_lines(path)?;
        let mut words = HashSet::new();
        for line in reader.lines() {
            let line = line?;
            words.insert(line.trim_end_matches('\r').to_string());
        }
        info!("loaded {} words from {}", words.len(), path);
        Ok(Self { words: Some(words) })
    }

    pub fn keeps(&self, word: &str) -> bool {
        match &self.words {
            Some(words) => words.contains(word),
            None => true,
        }
    }
}

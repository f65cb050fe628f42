//! File-backed `ProgramLoader`: reads a plain-text program image and writes
//! its words into memory. The core only ships the hard-coded sample loader
//! (`vm_machine::SampleProgramLoader`); a real file format is this console's
//! job to define, since the spec leaves it unspecified.
//!
//! Format: an optional leading `BASE <addr>` line (default base 300, the
//! sample program's own base), followed by one 8-character word per line.
//! Blank lines and lines starting with `#` are ignored, so a program image
//! can be commented.

use std::path::Path;

use vm_machine::ProgramLoader;
use vm_memory::Memory;
use vm_word::Word;

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("could not read program file {path:?}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed BASE line: {0:?}")]
    BadBase(String),
}

const DEFAULT_BASE: i64 = 300;

pub struct FileProgramLoader {
    base: i64,
    words: Vec<Word>,
}

impl FileProgramLoader {
    pub fn from_path(path: &Path) -> Result<Self, LoaderError> {
        let text = std::fs::read_to_string(path).map_err(|source| LoaderError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    fn parse(text: &str) -> Result<Self, LoaderError> {
        let mut base = DEFAULT_BASE;
        let mut words = Vec::new();
        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if words.is_empty() {
                if let Some(rest) = line.strip_prefix("BASE") {
                    base = rest
                        .trim()
                        .parse()
                        .map_err(|_| LoaderError::BadBase(line.to_string()))?;
                    continue;
                }
            }
            words.push(Word::from_raw(line.to_string()));
        }
        Ok(Self { base, words })
    }
}

impl ProgramLoader for FileProgramLoader {
    fn load(&self, memory: &Memory) -> i64 {
        for (offset, word) in self.words.iter().enumerate() {
            memory.write_raw(self.base + offset as i64, word.clone());
        }
        self.base
    }
}

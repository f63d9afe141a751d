//! Bijective word ↔ id index with stable insertion order.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Set;
use crate::binfmt::{self, MAGIC_VOCABULARY, SectionReader, SectionWriter};
use crate::error::{Error, Result};
use crate::lang::LanguageHint;

/// An ordered set of tokens. Each inserted token gets a stable id equal to its
/// insertion rank; ids are contiguous in `[0, len)` and never reused.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vocabulary {
    language: Option<LanguageHint>,
    words: Set<String>,
}

impl Vocabulary {
    pub fn new(language: Option<LanguageHint>) -> Self {
        Self {
            language,
            words: Set::default(),
        }
    }

    pub fn language(&self) -> Option<&LanguageHint> {
        self.language.as_ref()
    }

    pub fn set_language(&mut self, language: Option<LanguageHint>) {
        self.language = language;
    }

    /// Inserts `word` and returns its id. Re-inserting an existing word is
    /// idempotent and returns the existing id.
    pub fn add(&mut self, word: impl Into<String>) -> usize {
        self.words.insert_full(word.into()).0
    }

    pub fn word_to_id(&self, word: &str) -> Option<usize> {
        self.words.get_index_of(word)
    }

    pub fn id_to_word(&self, id: usize) -> Option<&str> {
        self.words.get_index(id).map(String::as_str)
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Words in id order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(String::as_str)
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn save_binary(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut w = SectionWriter::new(BufWriter::new(file), MAGIC_VOCABULARY)?;
        self.write_sections(&mut w)?;
        w.finish()?;
        Ok(())
    }

    pub fn load_binary(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut r = SectionReader::new(BufReader::new(file), MAGIC_VOCABULARY)?;
        Self::read_sections(&mut r)
    }

    /// Picks the representation by file extension: `.json` means JSON,
    /// anything else the native binary format.
    pub fn save(&self, path: &Path) -> Result<()> {
        if binfmt::is_json_path(path) {
            self.save_json(path)
        } else {
            self.save_binary(path)
        }
    }

    /// Dispatches on the file magic, falling back to JSON.
    pub fn load(path: &Path) -> Result<Self> {
        match binfmt::sniff_magic(path)? {
            Some(magic) if &magic == MAGIC_VOCABULARY => Self::load_binary(path),
            _ => Self::load_json(path),
        }
    }

    pub(crate) fn write_sections<W: std::io::Write>(&self, w: &mut SectionWriter<W>) -> Result<()> {
        w.write_opt_str(self.language.as_ref().map(LanguageHint::as_str))?;
        w.write_u64(self.words.len() as u64)?;
        for word in self.iter() {
            w.write_str(word)?;
        }
        Ok(())
    }

    pub(crate) fn read_sections<R: std::io::Read>(r: &mut SectionReader<R>) -> Result<Self> {
        let language = r.read_opt_str()?.map(LanguageHint::new);
        let len = r.read_u64()? as usize;
        let mut voc = Vocabulary::new(language);
        for _ in 0..len {
            voc.add(r.read_str()?);
        }
        if voc.len() != len {
            return Err(Error::invalid_input("duplicate words in stored vocabulary"));
        }
        Ok(voc)
    }
}

// IndexSet equality ignores order; a vocabulary is only equal to another with
// the identical id → word assignment.
impl PartialEq for Vocabulary {
    fn eq(&self, other: &Self) -> bool {
        self.language == other.language
            && self.words.len() == other.words.len()
            && self.words.iter().zip(other.words.iter()).all(|(a, b)| a == b)
    }
}

impl Eq for Vocabulary {}

impl<S: Into<String>> FromIterator<S> for Vocabulary {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let mut voc = Vocabulary::new(None);
        for word in iter {
            voc.add(word);
        }
        voc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_insertion_ranks() {
        let mut voc = Vocabulary::new(Some(LanguageHint::new("en")));
        assert_eq!(voc.add("cat"), 0);
        assert_eq!(voc.add("dog"), 1);
        assert_eq!(voc.add("cat"), 0); // idempotent
        assert_eq!(voc.len(), 2);
        assert_eq!(voc.word_to_id("dog"), Some(1));
        assert_eq!(voc.id_to_word(1), Some("dog"));
        assert_eq!(voc.id_to_word(2), None);
    }

    #[test]
    fn bijectivity() {
        let voc: Vocabulary = ["alpha", "beta", "gamma", "beta"].into_iter().collect();
        assert_eq!(voc.len(), 3);
        for id in 0..voc.len() {
            let word = voc.id_to_word(id).unwrap();
            assert_eq!(voc.word_to_id(word), Some(id));
        }
    }

    #[test]
    fn equality_is_order_sensitive() {
        let a: Vocabulary = ["x", "y"].into_iter().collect();
        let b: Vocabulary = ["y", "x"].into_iter().collect();
        assert_ne!(a, b);
        let c: Vocabulary = ["x", "y"].into_iter().collect();
        assert_eq!(a, c);
    }

    #[test]
    fn json_and_binary_round_trip() {
        let mut voc = Vocabulary::new(Some(LanguageHint::new("de")));
        voc.add("straße");
        voc.add("hund");

        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("voc.json");
        let bin = dir.path().join("voc.voc");

        voc.save(&json).unwrap();
        voc.save(&bin).unwrap();
        assert_eq!(Vocabulary::load(&json).unwrap(), voc);
        assert_eq!(Vocabulary::load(&bin).unwrap(), voc);
    }
}

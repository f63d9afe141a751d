//! Bilingual dictionary with per-word metadata.
//!
//! Entries connect a word on the A side to a word on the B side. Both
//! directions are indexed; metadata (provenance dictionaries, free tags,
//! unstemmed surface forms) is keyed per word and side and merged by set
//! union on every insertion, never removed.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::binfmt::{self, MAGIC_DICTIONARY, SectionReader, SectionWriter};
use crate::error::Result;
use crate::lang::LanguageHint;
use crate::vocabulary::Vocabulary;
use crate::{Map, Set};

/// Which side of the dictionary a word belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LanguageKind {
    A,
    B,
}

/// Reports the effect of an insertion relative to pre-existing state: which
/// direction acquired a genuinely new endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DirectionKind {
    AToB,
    BToA,
    /// Both endpoints already existed.
    Invariant,
}

/// Per-word, per-side metadata. All fields merge by union.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Set::is_empty")]
    pub dictionaries: Set<String>,
    #[serde(default, skip_serializing_if = "Set::is_empty")]
    pub tags: Set<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub unstemmed: Map<String, Set<String>>,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        self.dictionaries.is_empty() && self.tags.is_empty() && self.unstemmed.is_empty()
    }

    pub fn merge(&mut self, other: &Metadata) {
        self.dictionaries.extend(other.dictionaries.iter().cloned());
        self.tags.extend(other.tags.iter().cloned());
        for (surface, tags) in &other.unstemmed {
            self.unstemmed
                .entry(surface.clone())
                .or_default()
                .extend(tags.iter().cloned());
        }
    }

    pub fn solve(&self) -> SolvedMetadata {
        SolvedMetadata {
            dictionaries: self.dictionaries.iter().cloned().collect(),
            tags: self.tags.iter().cloned().collect(),
            unstemmed: self
                .unstemmed
                .iter()
                .map(|(surface, tags)| (surface.clone(), tags.iter().cloned().collect()))
                .collect(),
        }
    }
}

/// The resolved per-word metadata view handed out by lookups and filter
/// predicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolvedMetadata {
    dictionaries: Vec<String>,
    tags: Vec<String>,
    unstemmed: Vec<(String, Vec<String>)>,
}

impl SolvedMetadata {
    pub fn dictionaries(&self) -> &[String] {
        &self.dictionaries
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn unstemmed(&self) -> &[(String, Vec<String>)] {
        &self.unstemmed
    }

    pub fn has_dictionary(&self, name: &str) -> bool {
        self.dictionaries.iter().any(|d| d == name)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// One translation pair on its way into a [`Dictionary`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub word_a: String,
    pub word_b: String,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub meta_a: Metadata,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub meta_b: Metadata,
}

impl DictionaryEntry {
    pub fn new(word_a: impl Into<String>, word_b: impl Into<String>) -> Self {
        Self {
            word_a: word_a.into(),
            word_b: word_b.into(),
            meta_a: Metadata::default(),
            meta_b: Metadata::default(),
        }
    }

    fn meta_mut(&mut self, side: LanguageKind) -> &mut Metadata {
        match side {
            LanguageKind::A => &mut self.meta_a,
            LanguageKind::B => &mut self.meta_b,
        }
    }

    /// Records a provenance dictionary tag on one side.
    pub fn with_dictionary(mut self, side: LanguageKind, name: impl Into<String>) -> Self {
        self.meta_mut(side).dictionaries.insert(name.into());
        self
    }

    pub fn with_dictionaries<I, S>(mut self, side: LanguageKind, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.meta_mut(side)
            .dictionaries
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_meta(mut self, side: LanguageKind, tag: impl Into<String>) -> Self {
        self.meta_mut(side).tags.insert(tag.into());
        self
    }

    pub fn with_metas<I, S>(mut self, side: LanguageKind, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.meta_mut(side)
            .tags
            .extend(tags.into_iter().map(Into::into));
        self
    }

    /// Records an unstemmed surface form with its per-surface meta tags.
    pub fn with_unstemmed<I, S>(
        mut self,
        side: LanguageKind,
        surface: impl Into<String>,
        tags: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.meta_mut(side)
            .unstemmed
            .entry(surface.into())
            .or_default()
            .extend(tags.into_iter().map(Into::into));
        self
    }
}

/// One edge as yielded by [`Dictionary::iter`].
#[derive(Debug, Clone, PartialEq)]
pub struct DictionaryEdge<'a> {
    pub id_a: usize,
    pub word_a: &'a str,
    pub meta_a: Option<SolvedMetadata>,
    pub id_b: usize,
    pub word_b: &'a str,
    pub meta_b: Option<SolvedMetadata>,
    pub direction: DirectionKind,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dictionary {
    voc_a: Vocabulary,
    voc_b: Vocabulary,
    /// Every unstemmed surface form encountered, indexed like a vocabulary.
    unstemmed: Vocabulary,
    a_to_b: Map<usize, Set<usize>>,
    b_to_a: Map<usize, Set<usize>>,
    meta_a: Map<usize, Metadata>,
    meta_b: Map<usize, Metadata>,
    /// Every distinct edge once, in insertion order.
    edges: Vec<(usize, usize, DirectionKind)>,
}

impl Dictionary {
    pub fn new(lang_a: Option<LanguageHint>, lang_b: Option<LanguageHint>) -> Self {
        Self {
            voc_a: Vocabulary::new(lang_a),
            voc_b: Vocabulary::new(lang_b),
            ..Self::default()
        }
    }

    pub fn voc_a(&self) -> &Vocabulary {
        &self.voc_a
    }

    pub fn voc_b(&self) -> &Vocabulary {
        &self.voc_b
    }

    pub fn unstemmed_vocabulary(&self) -> &Vocabulary {
        &self.unstemmed
    }

    pub fn direction(&self) -> (Option<&LanguageHint>, Option<&LanguageHint>) {
        (self.voc_a.language(), self.voc_b.language())
    }

    /// Number of distinct edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Inserts `entry`, merging metadata by union with whatever is already
    /// stored for its endpoints.
    ///
    /// The returned [`DirectionKind`] reflects which direction acquired a new
    /// endpoint: a brand-new pair counts as `AToB` (the conventional primary
    /// direction), a pair whose A side already existed counts as `AToB` as
    /// well, a pair where only the A side is new counts as `BToA`, and a pair
    /// between two known words is `Invariant`.
    pub fn add(&mut self, entry: DictionaryEntry) -> (usize, usize, DirectionKind) {
        let a_existed = self.voc_a.contains(&entry.word_a);
        let b_existed = self.voc_b.contains(&entry.word_b);

        let id_a = self.voc_a.add(entry.word_a);
        let id_b = self.voc_b.add(entry.word_b);

        let direction = match (a_existed, b_existed) {
            (false, false) | (true, false) => DirectionKind::AToB,
            (false, true) => DirectionKind::BToA,
            (true, true) => DirectionKind::Invariant,
        };

        let new_ab = self.a_to_b.entry(id_a).or_default().insert(id_b);
        let new_ba = self.b_to_a.entry(id_b).or_default().insert(id_a);
        if new_ab || new_ba {
            self.edges.push((id_a, id_b, direction));
        }

        self.absorb_meta(LanguageKind::A, id_a, entry.meta_a);
        self.absorb_meta(LanguageKind::B, id_b, entry.meta_b);

        (id_a, id_b, direction)
    }

    /// Inline-argument form of [`Dictionary::add`].
    pub fn add_word_pair(
        &mut self,
        word_a: impl Into<String>,
        word_b: impl Into<String>,
    ) -> (usize, usize, DirectionKind) {
        self.add(DictionaryEntry::new(word_a, word_b))
    }

    fn absorb_meta(&mut self, side: LanguageKind, id: usize, meta: Metadata) {
        if meta.is_empty() {
            return;
        }
        for surface in meta.unstemmed.keys() {
            self.unstemmed.add(surface.clone());
        }
        let store = match side {
            LanguageKind::A => &mut self.meta_a,
            LanguageKind::B => &mut self.meta_b,
        };
        store.entry(id).or_default().merge(&meta);
    }

    pub fn voc_a_contains(&self, word: &str) -> bool {
        self.voc_a.contains(word)
    }

    pub fn voc_b_contains(&self, word: &str) -> bool {
        self.voc_b.contains(word)
    }

    /// Membership on either side.
    pub fn contains(&self, word: &str) -> bool {
        self.voc_a.contains(word) || self.voc_b.contains(word)
    }

    pub fn get_translation_a_to_b(&self, word: &str) -> Option<Vec<&str>> {
        let id = self.voc_a.word_to_id(word)?;
        self.translation_ids_a_to_b(id).map(|ids| {
            ids.iter()
                .filter_map(|&id_b| self.voc_b.id_to_word(id_b))
                .collect()
        })
    }

    pub fn get_translation_b_to_a(&self, word: &str) -> Option<Vec<&str>> {
        let id = self.voc_b.word_to_id(word)?;
        self.translation_ids_b_to_a(id).map(|ids| {
            ids.iter()
                .filter_map(|&id_a| self.voc_a.id_to_word(id_a))
                .collect()
        })
    }

    pub(crate) fn translation_ids_a_to_b(&self, id_a: usize) -> Option<&Set<usize>> {
        self.a_to_b.get(&id_a).filter(|ids| !ids.is_empty())
    }

    pub(crate) fn translation_ids_b_to_a(&self, id_b: usize) -> Option<&Set<usize>> {
        self.b_to_a.get(&id_b).filter(|ids| !ids.is_empty())
    }

    pub fn get_meta_a_of(&self, word: &str) -> Option<SolvedMetadata> {
        let id = self.voc_a.word_to_id(word)?;
        self.meta_a.get(&id).map(Metadata::solve)
    }

    pub fn get_meta_b_of(&self, word: &str) -> Option<SolvedMetadata> {
        let id = self.voc_b.word_to_id(word)?;
        self.meta_b.get(&id).map(Metadata::solve)
    }

    /// All provenance dictionary labels encountered on either side.
    pub fn known_dictionaries(&self) -> Set<String> {
        let mut out = Set::default();
        for meta in self.meta_a.values().chain(self.meta_b.values()) {
            out.extend(meta.dictionaries.iter().cloned());
        }
        out
    }

    /// All meta tags encountered on either side, including per-surface tags.
    pub fn tags(&self) -> Set<String> {
        let mut out = Set::default();
        for meta in self.meta_a.values().chain(self.meta_b.values()) {
            out.extend(meta.tags.iter().cloned());
            for tags in meta.unstemmed.values() {
                out.extend(tags.iter().cloned());
            }
        }
        out
    }

    /// A view of this dictionary with the A and B roles swapped. No word
    /// storage is copied; the view borrows `self`.
    pub fn switch_a_to_b(&self) -> DictionaryView<'_> {
        DictionaryView {
            dict: self,
            swapped: true,
        }
    }

    /// Every edge exactly once, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = DictionaryEdge<'_>> {
        self.edges.iter().map(|&(id_a, id_b, direction)| {
            DictionaryEdge {
                id_a,
                // Ids in the edge list always resolve; they were handed out
                // by the vocabularies at insertion.
                word_a: self.voc_a.id_to_word(id_a).unwrap_or_default(),
                meta_a: self.meta_a.get(&id_a).map(Metadata::solve),
                id_b,
                word_b: self.voc_b.id_to_word(id_b).unwrap_or_default(),
                meta_b: self.meta_b.get(&id_b).map(Metadata::solve),
                direction,
            }
        })
    }

    /// Retains the edges whose both endpoints satisfy the respective
    /// predicate, given their resolved metadata.
    pub fn filter<FA, FB>(&self, pred_a: FA, pred_b: FB) -> Dictionary
    where
        FA: Fn(&str, Option<&SolvedMetadata>) -> bool,
        FB: Fn(&str, Option<&SolvedMetadata>) -> bool,
    {
        let mut out = Dictionary::new(
            self.voc_a.language().cloned(),
            self.voc_b.language().cloned(),
        );

        let mut solved_a: Map<usize, Option<SolvedMetadata>> = Map::default();
        let mut solved_b: Map<usize, Option<SolvedMetadata>> = Map::default();

        for edge in self.iter() {
            let keep_a = solved_a
                .entry(edge.id_a)
                .or_insert_with(|| self.meta_a.get(&edge.id_a).map(Metadata::solve));
            if !pred_a(edge.word_a, keep_a.as_ref()) {
                continue;
            }
            let keep_b = solved_b
                .entry(edge.id_b)
                .or_insert_with(|| self.meta_b.get(&edge.id_b).map(Metadata::solve));
            if !pred_b(edge.word_b, keep_b.as_ref()) {
                continue;
            }

            let mut entry = DictionaryEntry::new(edge.word_a, edge.word_b);
            if let Some(meta) = self.meta_a.get(&edge.id_a) {
                entry.meta_a = meta.clone();
            }
            if let Some(meta) = self.meta_b.get(&edge.id_b) {
                entry.meta_b = meta.clone();
            }
            out.add(entry);
        }

        out
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
        let mut w = SectionWriter::new(BufWriter::new(file), MAGIC_DICTIONARY)?;
        self.voc_a.write_sections(&mut w)?;
        self.voc_b.write_sections(&mut w)?;
        self.unstemmed.write_sections(&mut w)?;
        w.write_u64(self.edges.len() as u64)?;
        for &(id_a, id_b, direction) in &self.edges {
            w.write_u64(id_a as u64)?;
            w.write_u64(id_b as u64)?;
            w.write_bytes(&serde_json::to_vec(&direction)?)?;
        }
        for store in [&self.meta_a, &self.meta_b] {
            w.write_u64(store.len() as u64)?;
            for (id, meta) in store {
                w.write_u64(*id as u64)?;
                w.write_bytes(&serde_json::to_vec(meta)?)?;
            }
        }
        w.finish()?;
        Ok(())
    }

    pub fn load_binary(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut r = SectionReader::new(BufReader::new(file), MAGIC_DICTIONARY)?;
        let voc_a = Vocabulary::read_sections(&mut r)?;
        let voc_b = Vocabulary::read_sections(&mut r)?;
        let unstemmed = Vocabulary::read_sections(&mut r)?;

        let mut dict = Dictionary {
            voc_a,
            voc_b,
            unstemmed,
            ..Dictionary::default()
        };

        let edge_count = r.read_u64()? as usize;
        for _ in 0..edge_count {
            let id_a = r.read_u64()? as usize;
            let id_b = r.read_u64()? as usize;
            let direction: DirectionKind = serde_json::from_slice(&r.read_bytes()?)?;
            dict.a_to_b.entry(id_a).or_default().insert(id_b);
            dict.b_to_a.entry(id_b).or_default().insert(id_a);
            dict.edges.push((id_a, id_b, direction));
        }
        for side in [LanguageKind::A, LanguageKind::B] {
            let len = r.read_u64()? as usize;
            for _ in 0..len {
                let id = r.read_u64()? as usize;
                let meta: Metadata = serde_json::from_slice(&r.read_bytes()?)?;
                let store = match side {
                    LanguageKind::A => &mut dict.meta_a,
                    LanguageKind::B => &mut dict.meta_b,
                };
                store.insert(id, meta);
            }
        }
        Ok(dict)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if binfmt::is_json_path(path) {
            self.save_json(path)
        } else {
            self.save_binary(path)
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        match binfmt::sniff_magic(path)? {
            Some(magic) if &magic == MAGIC_DICTIONARY => Self::load_binary(path),
            _ => Self::load_json(path),
        }
    }
}

impl PartialEq for Dictionary {
    fn eq(&self, other: &Self) -> bool {
        self.voc_a == other.voc_a
            && self.voc_b == other.voc_b
            && self.unstemmed == other.unstemmed
            && self.edges == other.edges
            && self.meta_a == other.meta_a
            && self.meta_b == other.meta_b
    }
}

/// Borrowing view over a [`Dictionary`] with optionally swapped roles.
#[derive(Debug, Clone, Copy)]
pub struct DictionaryView<'a> {
    dict: &'a Dictionary,
    swapped: bool,
}

impl<'a> DictionaryView<'a> {
    pub fn voc_a(&self) -> &'a Vocabulary {
        if self.swapped {
            self.dict.voc_b()
        } else {
            self.dict.voc_a()
        }
    }

    pub fn voc_b(&self) -> &'a Vocabulary {
        if self.swapped {
            self.dict.voc_a()
        } else {
            self.dict.voc_b()
        }
    }

    pub fn get_translation_a_to_b(&self, word: &str) -> Option<Vec<&'a str>> {
        if self.swapped {
            self.dict.get_translation_b_to_a(word)
        } else {
            self.dict.get_translation_a_to_b(word)
        }
    }

    pub fn get_translation_b_to_a(&self, word: &str) -> Option<Vec<&'a str>> {
        if self.swapped {
            self.dict.get_translation_a_to_b(word)
        } else {
            self.dict.get_translation_b_to_a(word)
        }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.dict.contains(word)
    }

    /// Flips the view again, yielding the original orientation.
    pub fn switch_a_to_b(&self) -> DictionaryView<'a> {
        DictionaryView {
            dict: self.dict,
            swapped: !self.swapped,
        }
    }
}

/// Restricts `dict` to edges whose A-side word occurs in `voc`.
///
/// The output's A vocabulary is `voc` itself (same ids; words of `dict`
/// missing from `voc` are dropped). The B vocabulary keeps only words still
/// referenced by an edge, re-compacted to contiguous ids while preserving
/// their relative order. Metadata is carried across unchanged.
pub fn create_topic_model_specific_dictionary(dict: &Dictionary, voc: &Vocabulary) -> Dictionary {
    let mut out = Dictionary {
        voc_a: voc.clone(),
        voc_b: Vocabulary::new(dict.voc_b.language().cloned()),
        ..Dictionary::default()
    };

    // Which old B ids survive, in old-id order.
    let mut referenced_b: Set<usize> = Set::default();
    for &(id_a, id_b, _) in &dict.edges {
        if dict
            .voc_a
            .id_to_word(id_a)
            .is_some_and(|word| voc.contains(word))
        {
            referenced_b.insert(id_b);
        }
    }
    let mut b_remap: Map<usize, usize> = Map::default();
    for old_b in 0..dict.voc_b.len() {
        if referenced_b.contains(&old_b)
            && let Some(word) = dict.voc_b.id_to_word(old_b)
        {
            b_remap.insert(old_b, out.voc_b.add(word));
        }
    }

    for &(old_a, old_b, direction) in &dict.edges {
        let Some(word_a) = dict.voc_a.id_to_word(old_a) else {
            continue;
        };
        let Some(new_a) = out.voc_a.word_to_id(word_a) else {
            continue;
        };
        let Some(&new_b) = b_remap.get(&old_b) else {
            continue;
        };

        let new_ab = out.a_to_b.entry(new_a).or_default().insert(new_b);
        let new_ba = out.b_to_a.entry(new_b).or_default().insert(new_a);
        if new_ab || new_ba {
            out.edges.push((new_a, new_b, direction));
        }

        if let Some(meta) = dict.meta_a.get(&old_a) {
            out.absorb_meta(LanguageKind::A, new_a, meta.clone());
        }
        if let Some(meta) = dict.meta_b.get(&old_b) {
            out.absorb_meta(LanguageKind::B, new_b, meta.clone());
        }
    }

    out
}

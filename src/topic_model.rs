//! The k×|V| topic matrix with its vocabulary and per-document data.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::Map;
use crate::binfmt::{self, MAGIC_TOPIC_MODEL, SectionReader, SectionWriter};
use crate::error::{Error, Result};
use crate::lang::LanguageHint;
use crate::vocabulary::Vocabulary;

/// Cached per-topic summary statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopicStats {
    pub max: f64,
    pub min: f64,
    pub avg: f64,
    pub sum: f64,
}

impl TopicStats {
    fn of(row: &[f64]) -> Self {
        let sum: f64 = row.iter().sum();
        let mut max = f64::NEG_INFINITY;
        let mut min = f64::INFINITY;
        for &p in row {
            max = max.max(p);
            min = min.min(p);
        }
        if row.is_empty() {
            max = 0.0;
            min = 0.0;
        }
        Self {
            max,
            min,
            avg: if row.is_empty() { 0.0 } else { sum / row.len() as f64 },
            sum,
        }
    }
}

/// Result of [`TopicModel::get_doc_probability`].
#[derive(Debug, Clone, PartialEq)]
pub struct DocProbability {
    /// `(topic, probability)` pairs at or above the minimum probability,
    /// ascending by topic id.
    pub topic_probabilities: Vec<(usize, f64)>,
    /// Per word: the topics it is assigned to, most likely first.
    pub word_topics: Option<Vec<(usize, Vec<usize>)>>,
    /// Per word: `(topic, phi)` pairs at or above the minimum phi value.
    pub word_phi_values: Option<Vec<(usize, Vec<(usize, f64)>)>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicModel {
    topics: Vec<Vec<f64>>,
    vocabulary: Vocabulary,
    used_vocab_frequency: Vec<u64>,
    doc_topic_distributions: Option<Vec<Vec<f64>>>,
    document_lengths: Option<Vec<u64>>,
    #[serde(skip)]
    stats: OnceLock<Vec<TopicStats>>,
}

impl TopicModel {
    /// Builds a model after validating its shape: every topic row must have
    /// one entry per vocabulary word, all of them finite and non-negative.
    pub fn new(
        topics: Vec<Vec<f64>>,
        vocabulary: Vocabulary,
        used_vocab_frequency: Vec<u64>,
        doc_topic_distributions: Option<Vec<Vec<f64>>>,
        document_lengths: Option<Vec<u64>>,
    ) -> Result<Self> {
        for (t, row) in topics.iter().enumerate() {
            if row.len() != vocabulary.len() {
                return Err(Error::invalid_input(format!(
                    "topic {t} has {} entries for a vocabulary of {}",
                    row.len(),
                    vocabulary.len()
                )));
            }
            if let Some(p) = row.iter().find(|p| !p.is_finite() || **p < 0.0) {
                return Err(Error::invalid_input(format!(
                    "topic {t} contains an invalid probability {p}"
                )));
            }
        }
        let used_vocab_frequency = if used_vocab_frequency.is_empty() {
            vec![0; vocabulary.len()]
        } else if used_vocab_frequency.len() == vocabulary.len() {
            used_vocab_frequency
        } else {
            return Err(Error::invalid_input(format!(
                "{} frequencies for a vocabulary of {}",
                used_vocab_frequency.len(),
                vocabulary.len()
            )));
        };
        Ok(Self {
            topics,
            vocabulary,
            used_vocab_frequency,
            doc_topic_distributions,
            document_lengths,
            stats: OnceLock::new(),
        })
    }

    pub fn builder(language: Option<LanguageHint>) -> TopicModelBuilder {
        TopicModelBuilder::new(language)
    }

    /// Number of topics.
    pub fn k(&self) -> usize {
        self.topics.len()
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn used_vocab_frequency(&self) -> &[u64] {
        &self.used_vocab_frequency
    }

    pub fn doc_topic_distributions(&self) -> Option<&[Vec<f64>]> {
        self.doc_topic_distributions.as_deref()
    }

    pub fn document_lengths(&self) -> Option<&[u64]> {
        self.document_lengths.as_deref()
    }

    pub fn get_topic(&self, topic: usize) -> Option<&[f64]> {
        self.topics.get(topic).map(Vec::as_slice)
    }

    /// Per-topic summary statistics, computed once on first use.
    pub fn stats(&self) -> &[TopicStats] {
        self.stats
            .get_or_init(|| self.topics.iter().map(|row| TopicStats::of(row)).collect())
    }

    /// Words of a topic sorted by probability descending; equal probabilities
    /// tie-break lexicographically.
    pub fn get_words_of_topic_sorted(&self, topic: usize) -> Option<Vec<(&str, f64)>> {
        let row = self.topics.get(topic)?;
        let mut words: Vec<(&str, f64)> = row
            .iter()
            .enumerate()
            .filter_map(|(id, &p)| self.vocabulary.id_to_word(id).map(|w| (w, p)))
            .collect();
        words.sort_by(|(wa, pa), (wb, pb)| pb.total_cmp(pa).then_with(|| wa.cmp(wb)));
        Some(words)
    }

    /// `(id, word, probability)` triples of a topic in id order.
    pub fn get_topic_as_words(&self, topic: usize) -> Option<Vec<(usize, &str, f64)>> {
        let row = self.topics.get(topic)?;
        Some(
            row.iter()
                .enumerate()
                .filter_map(|(id, &p)| self.vocabulary.id_to_word(id).map(|w| (id, w, p)))
                .collect(),
        )
    }

    /// Human readable summary of the top `n` words of every topic.
    pub fn show_top(&self, n: usize) -> String {
        let mut out = String::new();
        for topic in 0..self.k() {
            let _ = writeln!(out, "topic {topic}:");
            if let Some(words) = self.get_words_of_topic_sorted(topic) {
                for (rank, (word, p)) in words.into_iter().take(n).enumerate() {
                    let _ = writeln!(out, "  {:>2}. {word} ({p:.6})", rank + 1);
                }
            }
        }
        out
    }

    /// A new model whose topic rows are scaled to sum to one. Rows that sum
    /// to zero are left untouched.
    pub fn normalize(&self) -> TopicModel {
        let topics = self
            .topics
            .iter()
            .map(|row| {
                let sum: f64 = row.iter().sum();
                if sum > 0.0 {
                    row.iter().map(|p| p / sum).collect()
                } else {
                    row.clone()
                }
            })
            .collect();
        TopicModel {
            topics,
            vocabulary: self.vocabulary.clone(),
            used_vocab_frequency: self.used_vocab_frequency.clone(),
            doc_topic_distributions: self.doc_topic_distributions.clone(),
            document_lengths: self.document_lengths.clone(),
            stats: OnceLock::new(),
        }
    }

    /// Variational inference of the topic distribution of one document given
    /// as a `(word id, count)` bag.
    ///
    /// Follows the Gensim contract: returns the `(topic, probability)` pairs
    /// at or above `minimum_probability`, and, when `per_word_topics` is set,
    /// per-word topic assignments plus `(topic, phi)` pairs thresholded by
    /// `minimum_phi_value`. The gamma initialization is uniform instead of a
    /// random draw so repeated calls are bit-identical.
    pub fn get_doc_probability(
        &self,
        doc: &[(usize, u64)],
        alpha: f64,
        gamma_threshold: f64,
        minimum_probability: Option<f64>,
        minimum_phi_value: Option<f64>,
        per_word_topics: bool,
    ) -> Result<DocProbability> {
        const MAX_ITERATIONS: usize = 100;
        const PHI_GUARD: f64 = 1e-100;

        let k = self.k();
        if k == 0 {
            return Err(Error::invalid_input("model has no topics"));
        }
        if alpha <= 0.0 || !alpha.is_finite() {
            return Err(Error::invalid_input(format!("alpha must be positive, got {alpha}")));
        }
        for &(id, _) in doc {
            if id >= self.vocabulary.len() {
                return Err(Error::not_found(format!(
                    "word id {id} outside vocabulary of {}",
                    self.vocabulary.len()
                )));
            }
        }

        let minimum_probability = minimum_probability.unwrap_or(1e-8).max(1e-8);
        let minimum_phi_value = minimum_phi_value.unwrap_or(1e-8).max(1e-8);

        let doc_len: f64 = doc.iter().map(|&(_, c)| c as f64).sum();
        let mut gamma = vec![alpha + doc_len / k as f64; k];
        let mut exp_elog_theta = vec![0.0; k];

        for _ in 0..MAX_ITERATIONS {
            let gamma_sum: f64 = gamma.iter().sum();
            let digamma_sum = digamma(gamma_sum);
            for t in 0..k {
                exp_elog_theta[t] = (digamma(gamma[t]) - digamma_sum).exp();
            }

            let mut gamma_next = vec![alpha; k];
            for &(id, count) in doc {
                let mut phi_norm = PHI_GUARD;
                for t in 0..k {
                    phi_norm += exp_elog_theta[t] * self.topics[t][id];
                }
                for t in 0..k {
                    gamma_next[t] +=
                        count as f64 * exp_elog_theta[t] * self.topics[t][id] / phi_norm;
                }
            }

            let mean_change: f64 = gamma
                .iter()
                .zip(&gamma_next)
                .map(|(old, new)| (old - new).abs())
                .sum::<f64>()
                / k as f64;
            gamma = gamma_next;
            if mean_change < gamma_threshold {
                break;
            }
        }

        let gamma_sum: f64 = gamma.iter().sum();
        let topic_probabilities: Vec<(usize, f64)> = gamma
            .iter()
            .enumerate()
            .map(|(t, g)| (t, g / gamma_sum))
            .filter(|&(_, p)| p >= minimum_probability)
            .collect();

        if !per_word_topics {
            return Ok(DocProbability {
                topic_probabilities,
                word_topics: None,
                word_phi_values: None,
            });
        }

        let digamma_sum = digamma(gamma_sum);
        for t in 0..k {
            exp_elog_theta[t] = (digamma(gamma[t]) - digamma_sum).exp();
        }

        let mut word_topics = Vec::with_capacity(doc.len());
        let mut word_phi_values = Vec::with_capacity(doc.len());
        for &(id, _) in doc {
            let mut phis: Vec<(usize, f64)> = (0..k)
                .map(|t| (t, exp_elog_theta[t] * self.topics[t][id]))
                .collect();
            let norm: f64 = phis.iter().map(|&(_, phi)| phi).sum::<f64>() + PHI_GUARD;
            for (_, phi) in &mut phis {
                *phi /= norm;
            }
            phis.sort_by(|(ta, pa), (tb, pb)| pb.total_cmp(pa).then(ta.cmp(tb)));

            word_topics.push((
                id,
                phis.iter()
                    .filter(|&&(_, phi)| phi >= minimum_phi_value)
                    .map(|&(t, _)| t)
                    .collect(),
            ));
            word_phi_values.push((
                id,
                phis.into_iter()
                    .filter(|&(_, phi)| phi >= minimum_phi_value)
                    .collect(),
            ));
        }

        Ok(DocProbability {
            topic_probabilities,
            word_topics: Some(word_topics),
            word_phi_values: Some(word_phi_values),
        })
    }

    /// Projects each topic through a caller-provided word list, bypassing the
    /// dictionary and voting machinery entirely. `word_lists[t]` holds the
    /// `(target word, probability)` pairs of topic `t`.
    pub fn translate_by_provided_word_lists(
        &self,
        language: Option<LanguageHint>,
        word_lists: &[Vec<(String, f64)>],
    ) -> Result<TopicModel> {
        if word_lists.len() != self.k() {
            return Err(Error::invalid_input(format!(
                "{} word lists for {} topics",
                word_lists.len(),
                self.k()
            )));
        }

        let mut vocabulary = Vocabulary::new(language);
        for list in word_lists {
            for (word, _) in list {
                vocabulary.add(word.clone());
            }
        }

        let mut topics = vec![vec![0.0; vocabulary.len()]; self.k()];
        for (t, list) in word_lists.iter().enumerate() {
            for (word, p) in list {
                if !p.is_finite() || *p < 0.0 {
                    return Err(Error::invalid_input(format!(
                        "invalid probability {p} for '{word}' in topic {t}"
                    )));
                }
                let id = vocabulary
                    .word_to_id(word)
                    .ok_or_else(|| Error::InvariantViolation("word vanished from vocabulary".into()))?;
                topics[t][id] += p;
            }
        }
        fill_zeros_and_normalize(&mut topics, None)?;

        TopicModel::new(
            topics,
            vocabulary,
            Vec::new(),
            self.doc_topic_distributions.clone(),
            self.document_lengths.clone(),
        )
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
        let mut w = SectionWriter::new(BufWriter::new(file), MAGIC_TOPIC_MODEL)?;
        self.vocabulary.write_sections(&mut w)?;
        w.write_u64(self.topics.len() as u64)?;
        for row in &self.topics {
            w.write_f64_slice(row)?;
        }
        w.write_u64_slice(&self.used_vocab_frequency)?;
        match &self.doc_topic_distributions {
            Some(rows) => {
                w.write_u64(1)?;
                w.write_u64(rows.len() as u64)?;
                for row in rows {
                    w.write_f64_slice(row)?;
                }
            }
            None => w.write_u64(0)?,
        }
        match &self.document_lengths {
            Some(lengths) => {
                w.write_u64(1)?;
                w.write_u64_slice(lengths)?;
            }
            None => w.write_u64(0)?,
        }
        w.finish()?;
        Ok(())
    }

    pub fn load_binary(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut r = SectionReader::new(BufReader::new(file), MAGIC_TOPIC_MODEL)?;
        let vocabulary = Vocabulary::read_sections(&mut r)?;
        let k = r.read_u64()? as usize;
        let mut topics = Vec::with_capacity(k);
        for _ in 0..k {
            topics.push(r.read_f64_vec()?);
        }
        let used_vocab_frequency = r.read_u64_vec()?;
        let doc_topic_distributions = match r.read_u64()? {
            0 => None,
            _ => {
                let count = r.read_u64()? as usize;
                let mut rows = Vec::with_capacity(count);
                for _ in 0..count {
                    rows.push(r.read_f64_vec()?);
                }
                Some(rows)
            }
        };
        let document_lengths = match r.read_u64()? {
            0 => None,
            _ => Some(r.read_u64_vec()?),
        };
        TopicModel::new(
            topics,
            vocabulary,
            used_vocab_frequency,
            doc_topic_distributions,
            document_lengths,
        )
    }

    /// Picks the representation by file extension.
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
            Some(magic) if &magic == MAGIC_TOPIC_MODEL => Self::load_binary(path),
            _ => Self::load_json(path),
        }
    }
}

impl PartialEq for TopicModel {
    fn eq(&self, other: &Self) -> bool {
        self.topics == other.topics
            && self.vocabulary == other.vocabulary
            && self.used_vocab_frequency == other.used_vocab_frequency
            && self.doc_topic_distributions == other.doc_topic_distributions
            && self.document_lengths == other.document_lengths
    }
}

/// Replaces zero cells with `epsilon` and scales every row to sum to one.
///
/// With no explicit epsilon, the smallest positive cell of the whole matrix
/// minus one machine delta is used, clamped to stay positive.
pub(crate) fn fill_zeros_and_normalize(rows: &mut [Vec<f64>], epsilon: Option<f64>) -> Result<()> {
    let epsilon = epsilon.unwrap_or_else(|| {
        let min_positive = rows
            .iter()
            .flatten()
            .copied()
            .filter(|p| *p > 0.0)
            .fold(f64::INFINITY, f64::min);
        if min_positive.is_finite() {
            (min_positive - f64::EPSILON).max(f64::MIN_POSITIVE)
        } else {
            f64::EPSILON
        }
    });

    for (t, row) in rows.iter_mut().enumerate() {
        for p in row.iter_mut() {
            if !p.is_finite() || *p < 0.0 {
                return Err(Error::invalid_input(format!(
                    "topic {t} contains an invalid probability {p}"
                )));
            }
            if *p == 0.0 {
                *p = epsilon;
            }
        }
        let sum: f64 = row.iter().sum();
        if sum <= 0.0 || !sum.is_finite() {
            return Err(Error::InvariantViolation(format!(
                "topic {t} sums to {sum} after epsilon fill"
            )));
        }
        for p in row.iter_mut() {
            *p /= sum;
        }
    }
    Ok(())
}

/// Digamma by recurrence into the asymptotic region. Plenty for inference.
fn digamma(mut x: f64) -> f64 {
    let mut result = 0.0;
    while x < 6.0 {
        result -= 1.0 / x;
        x += 1.0;
    }
    let inv = 1.0 / x;
    let inv2 = inv * inv;
    result + x.ln() - 0.5 * inv
        - inv2 * (1.0 / 12.0 - inv2 * (1.0 / 120.0 - inv2 / 252.0))
}

#[derive(Debug, Clone, Default)]
pub struct TopicModelBuilder {
    vocabulary: Vocabulary,
    rows: Vec<Map<usize, f64>>,
    frequency: Map<usize, u64>,
    doc_topic_distributions: Option<Vec<Vec<f64>>>,
    document_lengths: Option<Vec<u64>>,
}

impl TopicModelBuilder {
    pub fn new(language: Option<LanguageHint>) -> Self {
        Self {
            vocabulary: Vocabulary::new(language),
            ..Self::default()
        }
    }

    pub fn set_frequency(&mut self, word: impl Into<String>, frequency: u64) -> &mut Self {
        let id = self.vocabulary.add(word);
        self.frequency.insert(id, frequency);
        self
    }

    /// Sets the probability of `word` in `topic`, inserting the word into the
    /// vocabulary if absent. A frequency, when given, accumulates.
    pub fn add_word(
        &mut self,
        topic: usize,
        word: impl Into<String>,
        probability: f64,
        frequency: Option<u64>,
    ) -> &mut Self {
        let id = self.vocabulary.add(word);
        if self.rows.len() <= topic {
            self.rows.resize_with(topic + 1, Map::default);
        }
        self.rows[topic].insert(id, probability);
        if let Some(f) = frequency {
            *self.frequency.entry(id).or_insert(0) += f;
        }
        self
    }

    pub fn set_doc_topic_distributions(
        &mut self,
        distributions: Option<Vec<Vec<f64>>>,
    ) -> &mut Self {
        self.doc_topic_distributions = distributions;
        self
    }

    pub fn set_document_lengths(&mut self, lengths: Option<Vec<u64>>) -> &mut Self {
        self.document_lengths = lengths;
        self
    }

    /// Validates and assembles the model; absent cells become zero.
    pub fn build(self) -> Result<TopicModel> {
        let size = self.vocabulary.len();
        let mut topics = vec![vec![0.0; size]; self.rows.len()];
        for (t, row) in self.rows.into_iter().enumerate() {
            for (id, p) in row {
                if id >= size {
                    return Err(Error::InvariantViolation(format!(
                        "word id {id} outside vocabulary of {size}"
                    )));
                }
                topics[t][id] = p;
            }
        }
        let mut frequency = vec![0; size];
        for (id, f) in self.frequency {
            frequency[id] = f;
        }
        TopicModel::new(
            topics,
            self.vocabulary,
            frequency,
            self.doc_topic_distributions,
            self.document_lengths,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_topic_model() -> TopicModel {
        let mut builder = TopicModel::builder(Some(LanguageHint::new("en")));
        builder
            .add_word(0, "cat", 0.7, Some(10))
            .add_word(0, "dog", 0.3, Some(5))
            .add_word(1, "tree", 0.9, Some(2))
            .add_word(1, "dog", 0.1, None)
            .set_document_lengths(Some(vec![4, 9]))
            .set_doc_topic_distributions(Some(vec![vec![0.5, 0.5], vec![0.2, 0.8]]));
        builder.build().unwrap()
    }

    #[test]
    fn builder_fills_missing_cells_with_zero() {
        let model = two_topic_model();
        assert_eq!(model.k(), 2);
        assert_eq!(model.get_topic(0).unwrap(), &[0.7, 0.3, 0.0]);
        assert_eq!(model.get_topic(1).unwrap(), &[0.0, 0.1, 0.9]);
        assert_eq!(model.used_vocab_frequency(), &[10, 5, 2]);
    }

    #[test]
    fn sorted_words_tie_break_lexicographically() {
        let mut builder = TopicModel::builder(None);
        builder
            .add_word(0, "zebra", 0.4, None)
            .add_word(0, "ant", 0.4, None)
            .add_word(0, "mole", 0.2, None);
        let model = builder.build().unwrap();
        let sorted = model.get_words_of_topic_sorted(0).unwrap();
        assert_eq!(sorted, vec![("ant", 0.4), ("zebra", 0.4), ("mole", 0.2)]);
    }

    #[test]
    fn normalize_makes_rows_stochastic() {
        let mut builder = TopicModel::builder(None);
        builder.add_word(0, "a", 2.0, None).add_word(0, "b", 6.0, None);
        let model = builder.build().unwrap().normalize();
        let row = model.get_topic(0).unwrap();
        assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((row[0] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn stats_are_cached_per_topic() {
        let model = two_topic_model();
        let stats = model.stats()[0];
        assert_eq!(stats.max, 0.7);
        assert_eq!(stats.min, 0.0);
        assert!((stats.sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn validation_rejects_ragged_rows() {
        let voc: Vocabulary = ["a", "b"].into_iter().collect();
        let err = TopicModel::new(vec![vec![1.0]], voc, Vec::new(), None, None).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn inference_prefers_the_topic_owning_the_words() {
        let model = two_topic_model().normalize();
        // a document of only "tree" should lean hard on topic 1
        let doc = [(2, 4)];
        let result = model
            .get_doc_probability(&doc, 0.1, 1e-4, None, None, true)
            .unwrap();
        let best = result
            .topic_probabilities
            .iter()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .unwrap();
        assert_eq!(best.0, 1);
        assert!(best.1 > 0.7);

        let word_topics = result.word_topics.unwrap();
        assert_eq!(word_topics[0].0, 2);
        assert_eq!(word_topics[0].1[0], 1);
    }

    #[test]
    fn inference_does_not_need_doc_distributions() {
        let mut builder = TopicModel::builder(None);
        builder.add_word(0, "only", 1.0, None);
        let model = builder.build().unwrap();
        assert!(model.doc_topic_distributions().is_none());
        let result = model
            .get_doc_probability(&[(0, 1)], 0.5, 1e-3, None, None, false)
            .unwrap();
        assert_eq!(result.topic_probabilities, vec![(0, 1.0)]);
    }

    #[test]
    fn provided_word_lists_project_directly() {
        let model = two_topic_model();
        let lists = vec![
            vec![("chat".to_string(), 0.7), ("chien".to_string(), 0.3)],
            vec![("arbre".to_string(), 1.0)],
        ];
        let translated = model
            .translate_by_provided_word_lists(Some(LanguageHint::new("fr")), &lists)
            .unwrap();
        assert_eq!(translated.k(), 2);
        assert_eq!(
            translated.vocabulary().iter().collect::<Vec<_>>(),
            vec!["chat", "chien", "arbre"]
        );
        let row = translated.get_topic(0).unwrap();
        assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        // carried through unchanged
        assert_eq!(translated.document_lengths(), model.document_lengths());
    }

    #[test]
    fn json_and_binary_round_trip() {
        let model = two_topic_model();
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("model.json");
        let bin = dir.path().join("model.tm");

        model.save(&json).unwrap();
        model.save(&bin).unwrap();
        assert_eq!(TopicModel::load(&json).unwrap(), model);
        assert_eq!(TopicModel::load(&bin).unwrap(), model);
    }

    #[test]
    fn show_top_lists_ranked_words() {
        let model = two_topic_model();
        let shown = model.show_top(2);
        assert!(shown.contains("topic 0:"));
        assert!(shown.contains("1. cat"));
        assert!(shown.contains("1. tree"));
    }
}

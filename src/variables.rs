//! Evaluation contexts and the layered variable provider.

use crate::Map;
use crate::dictionary::LanguageKind;
use crate::voting::Value;

/// The exact string identifiers recognized in voting contexts.
pub mod keys {
    pub const EPSILON: &str = "EPSILON";
    pub const VOCABULARY_SIZE_A: &str = "VOCABULARY_SIZE_A";
    pub const VOCABULARY_SIZE_B: &str = "VOCABULARY_SIZE_B";
    pub const TOPIC_MAX_PROBABILITY: &str = "TOPIC_MAX_PROBABILITY";
    pub const TOPIC_MIN_PROBABILITY: &str = "TOPIC_MIN_PROBABILITY";
    pub const TOPIC_AVG_PROBABILITY: &str = "TOPIC_AVG_PROBABILITY";
    pub const TOPIC_SUM_PROBABILITY: &str = "TOPIC_SUM_PROBABILITY";
    pub const COUNT_OF_VOTERS: &str = "COUNT_OF_VOTERS";
    pub const NUMBER_OF_VOTERS: &str = "NUMBER_OF_VOTERS";
    pub const HAS_TRANSLATION: &str = "HAS_TRANSLATION";
    pub const IS_ORIGIN_WORD: &str = "IS_ORIGIN_WORD";
    pub const SCORE_CANDIDATE: &str = "SCORE_CANDIDATE";
    pub const RECIPROCAL_RANK: &str = "RECIPROCAL_RANK";
    pub const REAL_RECIPROCAL_RANK: &str = "REAL_RECIPROCAL_RANK";
    pub const RANK: &str = "RANK";
    pub const IMPORTANCE: &str = "IMPORTANCE";
    pub const SCORE: &str = "SCORE";
    pub const VOTER_ID: &str = "VOTER_ID";
    pub const CANDIDATE_ID: &str = "CANDIDATE_ID";
    pub const TOPIC_ID: &str = "TOPIC_ID";
}

/// A mutable string-keyed variable scope. Votings may write intermediate
/// bookkeeping into any key; writes never outlive the translation of the
/// topic the context was built for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    vars: Map<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// Numeric shortcut used all over the engine.
    pub fn get_num(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_num)
    }

    pub fn extend_from(&mut self, other: &Map<String, Value>) {
        for (key, value) in other {
            self.vars.insert(key.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Pre-materialized variable overrides, layered beneath computed values.
///
/// Resolution precedence, most specific wins:
/// per-topic-word > per-word > per-topic > global > engine-computed default.
#[derive(Debug, Clone, Default)]
pub struct VariableProvider {
    global: Map<String, Value>,
    per_topic: Map<usize, Map<String, Value>>,
    per_word_a: Map<String, Map<String, Value>>,
    per_word_b: Map<String, Map<String, Value>>,
    per_topic_word_a: Map<(usize, String), Map<String, Value>>,
    per_topic_word_b: Map<(usize, String), Map<String, Value>>,
}

impl VariableProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_global(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.global.insert(key.into(), value.into());
    }

    pub fn add_for_topic(&mut self, topic: usize, key: impl Into<String>, value: impl Into<Value>) {
        self.per_topic
            .entry(topic)
            .or_default()
            .insert(key.into(), value.into());
    }

    pub fn add_for_word(
        &mut self,
        side: LanguageKind,
        word: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) {
        let store = match side {
            LanguageKind::A => &mut self.per_word_a,
            LanguageKind::B => &mut self.per_word_b,
        };
        store
            .entry(word.into())
            .or_default()
            .insert(key.into(), value.into());
    }

    pub fn add_for_topic_word(
        &mut self,
        side: LanguageKind,
        topic: usize,
        word: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) {
        let store = match side {
            LanguageKind::A => &mut self.per_topic_word_a,
            LanguageKind::B => &mut self.per_topic_word_b,
        };
        store
            .entry((topic, word.into()))
            .or_default()
            .insert(key.into(), value.into());
    }

    /// Overlays globals, then per-topic values, onto a global context.
    pub(crate) fn apply_global(&self, topic: usize, ctx: &mut Context) {
        ctx.extend_from(&self.global);
        if let Some(vars) = self.per_topic.get(&topic) {
            ctx.extend_from(vars);
        }
    }

    /// Overlays per-word, then per-topic-word values, onto a voter context.
    pub(crate) fn apply_word(
        &self,
        side: LanguageKind,
        topic: usize,
        word: &str,
        ctx: &mut Context,
    ) {
        let (per_word, per_topic_word) = match side {
            LanguageKind::A => (&self.per_word_a, &self.per_topic_word_a),
            LanguageKind::B => (&self.per_word_b, &self.per_topic_word_b),
        };
        if let Some(vars) = per_word.get(word) {
            ctx.extend_from(vars);
        }
        if let Some(vars) = per_topic_word.get(&(topic, word.to_string())) {
            ctx.extend_from(vars);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_set_and_get() {
        let mut ctx = Context::new();
        ctx.set(keys::SCORE, 0.0);
        ctx.set(keys::RANK, 3usize);
        assert_eq!(ctx.get_num(keys::RANK), Some(3.0));
        assert_eq!(ctx.get("UNSET"), None);
        // unrecognized keys are legal
        ctx.set("MY_BOOKKEEPING", true);
        assert!(ctx.get("MY_BOOKKEEPING").unwrap().is_truthy());
    }

    #[test]
    fn provider_layering_most_specific_wins() {
        let mut provider = VariableProvider::new();
        provider.add_global("W", 1.0);
        provider.add_for_topic(0, "W", 2.0);
        provider.add_for_word(LanguageKind::A, "cat", "W", 3.0);
        provider.add_for_topic_word(LanguageKind::A, 0, "cat", "W", 4.0);

        let mut global = Context::new();
        provider.apply_global(0, &mut global);
        assert_eq!(global.get_num("W"), Some(2.0));

        let mut voter = Context::new();
        voter.set("W", 0.0); // computed default
        provider.apply_word(LanguageKind::A, 0, "cat", &mut voter);
        assert_eq!(voter.get_num("W"), Some(4.0));

        let mut other_topic = Context::new();
        provider.apply_word(LanguageKind::A, 1, "cat", &mut other_topic);
        assert_eq!(other_topic.get_num("W"), Some(3.0));
    }
}

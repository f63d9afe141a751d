//! Tokenizer construction and runtime.
//!
//! A [`TokenizerBuilder`] accumulates the per-language configuration
//! (stemming, stopwords, separators, explicit word and phrase dictionaries,
//! normalization) and [`TokenizerBuilder::build`] freezes it into a
//! [`Tokenizer`]. Tokenization covers the whole input: every segment of the
//! text comes back as a `(surface, Token)` pair with byte and char offsets
//! into the original string.

use rust_stemmers::Stemmer;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::canonical_combining_class;
use unicode_segmentation::UnicodeSegmentation;

pub use rust_stemmers::Algorithm as StemmingAlgorithm;
pub use whatlang::{Lang as Language, Script};

use crate::Set;
use crate::lang::LanguageHint;
use crate::vocabulary::Vocabulary;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum TokenKind {
    Word,
    StopWord,
    /// An explicitly configured separator.
    SeparatorHard,
    /// Whitespace and incidental punctuation.
    SeparatorSoft,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Stemmed / normalized form.
    pub lemma: String,
    pub char_start: usize,
    pub char_end: usize,
    pub byte_start: usize,
    pub byte_end: usize,
    /// Original → normalized char index pairs, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_map: Option<Vec<(usize, usize)>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<Script>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
}

#[derive(Debug, Clone, Default)]
pub struct TokenizerBuilder {
    unicode_segmentation: bool,
    stemmer: Option<(StemmingAlgorithm, bool)>,
    stop_words: Set<String>,
    separators: Set<String>,
    words_dict: Set<String>,
    create_char_map: bool,
    lossy_normalization: bool,
    allow_list: Vec<(Script, Vec<Language>)>,
    phrase_vocabulary: Option<Vocabulary>,
}

impl TokenizerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pure unicode segmentation: no per-token language detection.
    pub fn unicode_segmentation(mut self, enabled: bool) -> Self {
        self.unicode_segmentation = enabled;
        self
    }

    /// Snowball stemming. With `smart` set, each token is stemmed with the
    /// algorithm of its detected language, falling back to `algorithm`.
    pub fn stemmer(mut self, algorithm: StemmingAlgorithm, smart: bool) -> Self {
        self.stemmer = Some((algorithm, smart));
        self
    }

    pub fn stop_words(mut self, words: Set<String>) -> Self {
        self.stop_words = words;
        self
    }

    pub fn separators(mut self, separators: Set<String>) -> Self {
        self.separators = separators;
        self
    }

    /// Words consulted first during tokenization; matches stay unstemmed.
    pub fn words_dict(mut self, words: Set<String>) -> Self {
        self.words_dict = words;
        self
    }

    pub fn create_char_map(mut self, enabled: bool) -> Self {
        self.create_char_map = enabled;
        self
    }

    /// NFKD, mark stripping and lowercasing instead of keeping surfaces.
    pub fn lossy_normalization(mut self, enabled: bool) -> Self {
        self.lossy_normalization = enabled;
        self
    }

    /// Constrains language detection to `languages` for tokens of `script`.
    pub fn allow_list(mut self, script: Script, languages: Vec<Language>) -> Self {
        if let Some(entry) = self.allow_list.iter_mut().find(|(s, _)| *s == script) {
            entry.1 = languages;
        } else {
            self.allow_list.push((script, languages));
        }
        self
    }

    /// Runs of tokens forming a phrase of `vocabulary` collapse into a
    /// single word token in a post-pass.
    pub fn phrase_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.phrase_vocabulary = Some(vocabulary);
        self
    }

    /// The configured stopword set.
    pub fn create_stopword_filter(&self) -> Set<String> {
        self.stop_words.clone()
    }

    pub fn build(&self) -> Tokenizer {
        let stemmer = self
            .stemmer
            .as_ref()
            .map(|(algorithm, _)| Stemmer::create(algorithm.clone()));
        let (phrases, max_phrase_words) = match &self.phrase_vocabulary {
            Some(voc) => {
                let mut phrases = Set::default();
                let mut max_words = 0;
                for phrase in voc.iter() {
                    let words: Vec<String> = phrase
                        .split_whitespace()
                        .map(|word| normalize_word(word, self.lossy_normalization))
                        .collect();
                    if words.len() > 1 {
                        max_words = max_words.max(words.len());
                        phrases.insert(words.join(" "));
                    }
                }
                (phrases, max_words)
            }
            None => (Set::default(), 0),
        };
        Tokenizer {
            cfg: self.clone(),
            stemmer,
            phrases,
            max_phrase_words,
        }
    }
}

pub struct Tokenizer {
    cfg: TokenizerBuilder,
    stemmer: Option<Stemmer>,
    /// Normalized space-joined multi-word phrases.
    phrases: Set<String>,
    max_phrase_words: usize,
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("cfg", &self.cfg)
            .field("phrases", &self.phrases.len())
            .finish()
    }
}

impl Tokenizer {
    /// Tokenizes `text` into an ordered list of `(surface, Token)` pairs
    /// covering the input. The optional hint biases language detection.
    pub fn tokenize(&self, hint: Option<&LanguageHint>, text: &str) -> Vec<(String, Token)> {
        let hint_lang = hint.and_then(|h| Language::from_code(h.as_str()));
        let mut tokens = Vec::new();
        let mut char_pos = 0;

        for (byte_start, segment) in text.split_word_bound_indices() {
            let char_start = char_pos;
            let char_count = segment.chars().count();
            char_pos += char_count;

            let token = self.classify(segment, byte_start, char_start, hint_lang);
            tokens.push((segment.to_string(), token));
        }

        if self.max_phrase_words > 1 {
            tokens = self.collapse_phrases(text, tokens);
        }
        tokens
    }

    fn classify(
        &self,
        segment: &str,
        byte_start: usize,
        char_start: usize,
        hint_lang: Option<Language>,
    ) -> Token {
        let char_count = segment.chars().count();
        let (normalized, char_map) = self.normalize(segment, char_start);
        let script = whatlang::detect_script(segment);
        let in_set = |set: &Set<String>| set.contains(segment) || set.contains(&normalized);

        let mut token = Token {
            kind: TokenKind::Unknown,
            lemma: String::new(),
            char_start,
            char_end: char_start + char_count,
            byte_start,
            byte_end: byte_start + segment.len(),
            char_map,
            script,
            language: None,
        };

        if in_set(&self.cfg.separators) {
            token.kind = TokenKind::SeparatorHard;
        } else if segment.chars().all(char::is_whitespace) {
            token.kind = TokenKind::SeparatorSoft;
        } else if in_set(&self.cfg.stop_words) {
            token.kind = TokenKind::StopWord;
            token.language = self.detect(segment, script, hint_lang);
        } else if in_set(&self.cfg.words_dict) {
            // explicit dictionary words stay unstemmed
            token.kind = TokenKind::Word;
            token.language = self.detect(segment, script, hint_lang);
        } else if segment.chars().any(char::is_alphanumeric) {
            token.kind = TokenKind::Word;
            token.language = self.detect(segment, script, hint_lang);
            token.lemma = self.stem(&normalized, token.language);
            return token;
        } else if !segment.is_empty() {
            token.kind = TokenKind::SeparatorSoft;
        }
        token.lemma = normalized;
        token
    }

    /// The detected language of one token, unless language handling is off.
    fn detect(
        &self,
        segment: &str,
        script: Option<Script>,
        hint_lang: Option<Language>,
    ) -> Option<Language> {
        if self.cfg.unicode_segmentation {
            return None;
        }
        let allowed = script
            .and_then(|script| self.cfg.allow_list.iter().find(|(s, _)| *s == script))
            .map(|(_, langs)| langs.as_slice());
        match allowed {
            Some(langs) if langs.len() == 1 => Some(langs[0]),
            Some(langs) => whatlang::Detector::with_allowlist(langs.to_vec())
                .detect(segment)
                .map(|info| info.lang())
                .or(hint_lang),
            None => hint_lang.or_else(|| whatlang::detect_lang(segment)),
        }
    }

    fn stem(&self, lemma: &str, language: Option<Language>) -> String {
        let Some((fallback, smart)) = self.cfg.stemmer.as_ref() else {
            return lemma.to_string();
        };
        if *smart
            && let Some(algorithm) = language.and_then(algorithm_for_language)
            && std::mem::discriminant(&algorithm) != std::mem::discriminant(fallback)
        {
            return Stemmer::create(algorithm).stem(lemma).into_owned();
        }
        self.base_stem(lemma)
    }

    fn base_stem(&self, lemma: &str) -> String {
        match &self.stemmer {
            Some(stemmer) => stemmer.stem(lemma).into_owned(),
            None => lemma.to_string(),
        }
    }

    /// Normalization of one segment plus the original → normalized char map.
    fn normalize(&self, segment: &str, char_start: usize) -> (String, Option<Vec<(usize, usize)>>) {
        if !self.cfg.lossy_normalization {
            let map = self.cfg.create_char_map.then(|| {
                (0..segment.chars().count())
                    .map(|i| (char_start + i, i))
                    .collect()
            });
            return (segment.to_string(), map);
        }

        let mut lemma = String::with_capacity(segment.len());
        let mut map = self.cfg.create_char_map.then(Vec::new);
        let mut produced = 0;
        for (i, c) in segment.chars().enumerate() {
            for nc in c.nfkd() {
                if canonical_combining_class(nc) != 0 {
                    continue;
                }
                for lowered in nc.to_lowercase() {
                    lemma.push(lowered);
                    if let Some(map) = &mut map {
                        map.push((char_start + i, produced));
                    }
                    produced += 1;
                }
            }
        }
        (lemma, map)
    }

    /// Collapses runs of word tokens matching a configured phrase. Soft
    /// separators inside a run are allowed; hard separators break it.
    fn collapse_phrases(
        &self,
        text: &str,
        tokens: Vec<(String, Token)>,
    ) -> Vec<(String, Token)> {
        let mut out: Vec<(String, Token)> = Vec::with_capacity(tokens.len());
        let mut i = 0;

        while i < tokens.len() {
            let is_wordish = matches!(tokens[i].1.kind, TokenKind::Word | TokenKind::StopWord);
            if !is_wordish {
                out.push(tokens[i].clone());
                i += 1;
                continue;
            }

            // candidate word positions for a phrase starting here
            let mut word_positions = vec![i];
            let mut j = i + 1;
            while word_positions.len() < self.max_phrase_words && j < tokens.len() {
                match tokens[j].1.kind {
                    TokenKind::Word | TokenKind::StopWord => word_positions.push(j),
                    TokenKind::SeparatorSoft => {}
                    _ => break,
                }
                j += 1;
            }

            let mut collapsed = None;
            for take in (2..=word_positions.len()).rev() {
                let run = &word_positions[..take];
                let joined = run
                    .iter()
                    .map(|&p| tokens[p].1.lemma.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                if self.phrases.contains(&joined) {
                    collapsed = Some((run.to_vec(), joined));
                    break;
                }
            }

            match collapsed {
                Some((run, lemma)) => {
                    let first = &tokens[run[0]].1;
                    let last = &tokens[*run.last().unwrap()].1;
                    let char_map = self.cfg.create_char_map.then(|| {
                        run.iter()
                            .filter_map(|&p| tokens[p].1.char_map.as_ref())
                            .flatten()
                            .copied()
                            .collect()
                    });
                    let token = Token {
                        kind: TokenKind::Word,
                        lemma,
                        char_start: first.char_start,
                        char_end: last.char_end,
                        byte_start: first.byte_start,
                        byte_end: last.byte_end,
                        char_map,
                        script: first.script,
                        language: first.language,
                    };
                    let surface = text[token.byte_start..token.byte_end].to_string();
                    let resume = *run.last().unwrap() + 1;
                    out.push((surface, token));
                    i = resume;
                }
                None => {
                    out.push(tokens[i].clone());
                    i += 1;
                }
            }
        }
        out
    }
}

/// The Snowball algorithm for a detected language, if it has one.
fn algorithm_for_language(language: Language) -> Option<StemmingAlgorithm> {
    use StemmingAlgorithm as A;
    match language {
        Language::Ara => Some(A::Arabic),
        Language::Dan => Some(A::Danish),
        Language::Nld => Some(A::Dutch),
        Language::Eng => Some(A::English),
        Language::Fin => Some(A::Finnish),
        Language::Fra => Some(A::French),
        Language::Deu => Some(A::German),
        Language::Ell => Some(A::Greek),
        Language::Hun => Some(A::Hungarian),
        Language::Ita => Some(A::Italian),
        Language::Nob => Some(A::Norwegian),
        Language::Por => Some(A::Portuguese),
        Language::Ron => Some(A::Romanian),
        Language::Rus => Some(A::Russian),
        Language::Spa => Some(A::Spanish),
        Language::Swe => Some(A::Swedish),
        Language::Tam => Some(A::Tamil),
        Language::Tur => Some(A::Turkish),
        _ => None,
    }
}

fn normalize_word(word: &str, lossy: bool) -> String {
    if !lossy {
        return word.to_string();
    }
    word.nfkd()
        .filter(|c| canonical_combining_class(*c) == 0)
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> Set<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn offsets_cover_the_input() {
        let tokenizer = TokenizerBuilder::new().unicode_segmentation(true).build();
        let text = "héllo wörld";
        let tokens = tokenizer.tokenize(None, text);

        let mut byte = 0;
        let mut chars = 0;
        for (surface, token) in &tokens {
            assert_eq!(token.byte_start, byte);
            assert_eq!(token.char_start, chars);
            byte = token.byte_end;
            chars = token.char_end;
            assert_eq!(&text[token.byte_start..token.byte_end], surface);
        }
        assert_eq!(byte, text.len());
        assert_eq!(chars, text.chars().count());
    }

    #[test]
    fn stopwords_and_separators_classify() {
        let tokenizer = TokenizerBuilder::new()
            .unicode_segmentation(true)
            .stop_words(set(&["the"]))
            .separators(set(&[";"]))
            .build();
        let tokens = tokenizer.tokenize(None, "the cat; dog");
        let kinds: Vec<TokenKind> = tokens.iter().map(|(_, t)| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::StopWord,
                TokenKind::SeparatorSoft,
                TokenKind::Word,
                TokenKind::SeparatorHard,
                TokenKind::SeparatorSoft,
                TokenKind::Word,
            ]
        );
    }

    #[test]
    fn stemming_applies_to_words_only() {
        let tokenizer = TokenizerBuilder::new()
            .unicode_segmentation(true)
            .stemmer(StemmingAlgorithm::English, false)
            .stop_words(set(&["running"]))
            .build();
        let tokens = tokenizer.tokenize(None, "running jumping");
        // the stopword keeps its surface, the word is stemmed
        assert_eq!(tokens[0].1.lemma, "running");
        assert_eq!(tokens[2].1.lemma, "jump");
    }

    #[test]
    fn words_dict_overrides_stemming_but_not_stopwords() {
        let tokenizer = TokenizerBuilder::new()
            .unicode_segmentation(true)
            .stemmer(StemmingAlgorithm::English, false)
            .words_dict(set(&["jumping", "the"]))
            .stop_words(set(&["the"]))
            .build();
        let tokens = tokenizer.tokenize(None, "the jumping");
        assert_eq!(tokens[0].1.kind, TokenKind::StopWord);
        assert_eq!(tokens[2].1.kind, TokenKind::Word);
        assert_eq!(tokens[2].1.lemma, "jumping"); // unstemmed
    }

    #[test]
    fn lossy_normalization_strips_marks_and_case() {
        let tokenizer = TokenizerBuilder::new()
            .unicode_segmentation(true)
            .lossy_normalization(true)
            .create_char_map(true)
            .build();
        let tokens = tokenizer.tokenize(None, "Héllo");
        let token = &tokens[0].1;
        assert_eq!(token.lemma, "hello");
        // é decomposes into e + mark; the mark vanishes, indices stay aligned
        let map = token.char_map.as_ref().unwrap();
        assert_eq!(map.len(), 5);
        assert_eq!(map[1], (1, 1));
    }

    #[test]
    fn script_detection_tags_words() {
        let tokenizer = TokenizerBuilder::new().unicode_segmentation(true).build();
        let tokens = tokenizer.tokenize(None, "hello мир");
        assert_eq!(tokens[0].1.script, Some(Script::Latin));
        assert_eq!(tokens[2].1.script, Some(Script::Cyrillic));
    }

    #[test]
    fn hint_feeds_language_detection() {
        let tokenizer = TokenizerBuilder::new()
            .stemmer(StemmingAlgorithm::English, true)
            .build();
        let hint = LanguageHint::new("deu");
        let tokens = tokenizer.tokenize(Some(&hint), "laufen");
        assert_eq!(tokens[0].1.kind, TokenKind::Word);
        assert!(tokens[0].1.language.is_some());
    }

    #[test]
    fn allow_list_constrains_detection() {
        let tokenizer = TokenizerBuilder::new()
            .allow_list(Script::Latin, vec![Language::Fra])
            .build();
        let tokens = tokenizer.tokenize(None, "bonjour");
        assert_eq!(tokens[0].1.language, Some(Language::Fra));
    }

    #[test]
    fn phrases_collapse_runs() {
        let phrases: Vocabulary = ["new york", "new york city"].into_iter().collect();
        let tokenizer = TokenizerBuilder::new()
            .unicode_segmentation(true)
            .phrase_vocabulary(phrases)
            .build();
        let tokens = tokenizer.tokenize(None, "visit new york city now");
        let words: Vec<&str> = tokens
            .iter()
            .filter(|(_, t)| t.kind == TokenKind::Word)
            .map(|(s, _)| s.as_str())
            .collect();
        // longest match wins
        assert_eq!(words, vec!["visit", "new york city", "now"]);
        let phrase = tokens
            .iter()
            .find(|(s, _)| s == "new york city")
            .map(|(_, t)| t)
            .unwrap();
        assert_eq!(phrase.lemma, "new york city");
        assert_eq!(phrase.char_start, 6);
        assert_eq!(phrase.char_end, 19);
    }

    #[test]
    fn phrase_matching_follows_normalization() {
        let phrases: Vocabulary = ["New York"].into_iter().collect();
        let tokenizer = TokenizerBuilder::new()
            .unicode_segmentation(true)
            .lossy_normalization(true)
            .phrase_vocabulary(phrases)
            .build();
        let tokens = tokenizer.tokenize(None, "in new YORK today");
        assert!(tokens.iter().any(|(s, _)| s == "new YORK"));
    }

    #[test]
    fn stopword_filter_returns_the_configured_set() {
        let builder = TokenizerBuilder::new().stop_words(set(&["a", "the"]));
        let filter = builder.create_stopword_filter();
        assert!(filter.contains("the") && filter.len() == 2);
    }
}

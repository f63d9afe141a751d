use topictrans::aligned::{AlignedArticle, AlignedArticleProcessor, Article};
use topictrans::dictionary::{Dictionary, DictionaryEntry, LanguageKind};
use topictrans::lang::LanguageHint;
use topictrans::pipeline::{
    StoreOptions, TokenCountFilter, read_and_parse_aligned_articles_into,
    read_bulk_tokenized_articles,
};
use topictrans::tokenize::TokenizerBuilder;
use topictrans::topic_model::TopicModel;
use topictrans::translate::{KeepOriginalWord, TranslateConfig, translate_topic_model};
use topictrans::variables::keys;
use topictrans::vocabulary::Vocabulary;
use topictrans::voting::{BuiltInVoting, Voting, VotingRegistry};
use topictrans::{Map, Set};

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use std::fs;
use std::path::Path;
use std::sync::Once;

fn setup_tracing_test() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .init();
    });
}

fn model(words: &[&str], topics: &[&[f64]]) -> TopicModel {
    let mut builder = TopicModel::builder(Some(LanguageHint::new("en")));
    for (t, row) in topics.iter().enumerate() {
        for (word, &p) in words.iter().zip(row.iter()) {
            builder.add_word(t, *word, p, Some(1));
        }
    }
    builder.build().unwrap()
}

fn dict(pairs: &[(&str, &str)]) -> Dictionary {
    let mut dict = Dictionary::new(
        Some(LanguageHint::new("en")),
        Some(LanguageHint::new("fr")),
    );
    for (a, b) in pairs {
        dict.add_word_pair(*a, *b);
    }
    dict
}

fn translate(
    model: &TopicModel,
    dict: &Dictionary,
    voting: BuiltInVoting,
    config: &TranslateConfig,
) -> TopicModel {
    translate_topic_model(model, dict, &Voting::from(voting), config, None, None).unwrap()
}

fn words_of(model: &TopicModel) -> Vec<&str> {
    model.vocabulary().iter().collect()
}

#[test]
fn scenario_trivial_identity() {
    setup_tracing_test();
    let model = model(&["cat"], &[&[1.0]]);
    let dict = dict(&[("cat", "chat")]);
    let out = translate(&model, &dict, BuiltInVoting::CombSum, &Default::default());
    assert_eq!(out.k(), 1);
    assert_eq!(words_of(&out), vec!["chat"]);
    assert_eq!(out.get_topic(0).unwrap(), &[1.0]);
}

#[test]
fn scenario_two_to_one_merge() {
    let model = model(&["cat", "kitten"], &[&[0.3, 0.7]]);
    let dict = dict(&[("cat", "chat"), ("kitten", "chat")]);
    let out = translate(&model, &dict, BuiltInVoting::CombSum, &Default::default());
    assert_eq!(words_of(&out), vec!["chat"]);
    assert_eq!(out.get_topic(0).unwrap(), &[1.0]);
}

#[test]
fn scenario_one_to_two_split() {
    let model = model(&["big"], &[&[1.0]]);
    let dict = dict(&[("big", "grand"), ("big", "gros")]);
    let out = translate(&model, &dict, BuiltInVoting::CombSum, &Default::default());
    let row = out.get_topic(0).unwrap();
    assert!((row[0] - 0.5).abs() < 1e-12);
    assert!((row[1] - 0.5).abs() < 1e-12);
}

#[test]
fn scenario_comb_max_vs_comb_sum() {
    let model = model(&["a", "b", "other"], &[&[0.4, 0.5, 0.1]]);
    let dict = dict(&[("a", "x"), ("b", "x"), ("other", "y")]);

    let sum = translate(&model, &dict, BuiltInVoting::CombSum, &Default::default());
    let max = translate(&model, &dict, BuiltInVoting::CombMax, &Default::default());

    assert!((sum.get_topic(0).unwrap()[0] - 0.9).abs() < 1e-12);
    assert!((max.get_topic(0).unwrap()[0] - 0.5 / 0.6).abs() < 1e-12);
}

#[test]
fn scenario_keep_if_no_translation() {
    let model = model(&["cat", "xyz"], &[&[0.3, 0.7]]);
    let dict = dict(&[("cat", "chat")]);
    let config = TranslateConfig {
        keep_original_word: KeepOriginalWord::IfNoTranslation,
        ..Default::default()
    };
    let out = translate(&model, &dict, BuiltInVoting::CombSum, &config);
    assert_eq!(words_of(&out), vec!["chat", "xyz"]);
    let row = out.get_topic(0).unwrap();
    assert!((row[0] - 0.3).abs() < 1e-12);
    assert!((row[1] - 0.7).abs() < 1e-12);
}

#[test]
fn keep_always_keeps_translated_words_too() {
    let model = model(&["cat", "xyz"], &[&[0.3, 0.7]]);
    let dict = dict(&[("cat", "chat")]);
    let config = TranslateConfig {
        keep_original_word: KeepOriginalWord::Always,
        ..Default::default()
    };
    let out = translate(&model, &dict, BuiltInVoting::CombSum, &config);
    assert_eq!(words_of(&out), vec!["chat", "cat", "xyz"]);
    let row = out.get_topic(0).unwrap();
    // chat and cat both carry the 0.3 of "cat"
    assert!((row[0] - row[1]).abs() < 1e-12);
}

#[test]
fn scenario_token_count_filter() -> Result<()> {
    setup_tracing_test();
    let dir = tempfile::tempdir()?;
    let path_in = dir.path().join("corpus.jsonl");
    let path_out = dir.path().join("bulk.bin");

    let words = |n: usize| {
        (0..n)
            .map(|i| format!("w{i}"))
            .collect::<Vec<_>>()
            .join(" ")
    };
    let mut lines = String::new();
    for (id, n) in [(0u64, 2usize), (1, 50), (2, 500)] {
        let article = AlignedArticle::new(
            id,
            [
                Article::new("en", words(n)),
                Article::new("de", words(20)),
            ],
        );
        lines.push_str(&article.to_json()?);
        lines.push('\n');
    }
    fs::write(&path_in, lines)?;

    let mut builders: Map<LanguageHint, TokenizerBuilder> = Map::default();
    for lang in ["en", "de"] {
        builders.insert(
            LanguageHint::new(lang),
            TokenizerBuilder::new().unicode_segmentation(true),
        );
    }
    let processor = AlignedArticleProcessor::new(builders);

    let kept = read_and_parse_aligned_articles_into(
        &path_in,
        &path_out,
        &processor,
        Some(TokenCountFilter::new(Some(10), Some(200))),
        StoreOptions {
            temp_folder: Some(dir.path().to_path_buf()),
            ..Default::default()
        },
    )?;

    assert_eq!(kept, 1);
    let stored = read_bulk_tokenized_articles(&path_out, false, false)?;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].article_id, 1);
    Ok(())
}

#[test]
fn registry_voting_end_to_end() {
    let model = model(&["a", "b"], &[&[0.4, 0.6]]);
    let dict = dict(&[("a", "x"), ("b", "x"), ("b", "y")]);

    let mut registry = VotingRegistry::new();
    registry
        .register("strongest = max(SCORE_CANDIDATE)")
        .unwrap();

    // weight the strongest voter double, through composition
    let voting = Voting::parse("strongest + sum(SCORE_CANDIDATE)").unwrap();
    let out = translate_topic_model(
        &model,
        &dict,
        &voting,
        &TranslateConfig::default(),
        None,
        Some(&registry),
    )
    .unwrap();
    let row = out.get_topic(0).unwrap();
    // x: 0.6 + 1.0 = 1.6; y: 0.6 + 0.6 = 1.2
    assert!((row[0] / row[1] - 1.6 / 1.2).abs() < 1e-9);
}

#[test]
fn callback_voting_end_to_end() {
    let model = model(&["a", "b"], &[&[0.4, 0.6]]);
    let dict = dict(&[("a", "x"), ("b", "x")]);

    let voting = Voting::from_callback(
        |_global: &mut topictrans::Context, voters: &mut [topictrans::Context]| {
            let best = voters
                .iter()
                .filter_map(|v| v.get_num(keys::SCORE_CANDIDATE))
                .fold(0.0f64, f64::max);
            Ok(best * 2.0)
        },
    );
    let out = translate_topic_model(
        &model,
        &dict,
        &voting,
        &TranslateConfig::default(),
        None,
        None,
    )
    .unwrap();
    assert_eq!(out.get_topic(0).unwrap(), &[1.0]);
}

#[test]
fn determinism_across_worker_counts() {
    let words: Vec<String> = (0..40).map(|i| format!("w{i}")).collect();
    let word_refs: Vec<&str> = words.iter().map(String::as_str).collect();
    let rows: Vec<Vec<f64>> = (0..8)
        .map(|t| (0..40).map(|w| 1.0 + ((w * 13 + t * 7) % 23) as f64).collect())
        .collect();
    let row_refs: Vec<&[f64]> = rows.iter().map(Vec::as_slice).collect();
    let model = model(&word_refs, &row_refs);

    let mut pairs = Vec::new();
    for w in 0..40 {
        pairs.push((format!("w{w}"), format!("t{}", w % 11)));
        pairs.push((format!("w{w}"), format!("t{}", (w * 3) % 11)));
    }
    let pair_refs: Vec<(&str, &str)> = pairs.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
    let dict = dict(&pair_refs);

    let single = rayon::ThreadPoolBuilder::new()
        .num_threads(1)
        .build()
        .unwrap()
        .install(|| translate(&model, &dict, BuiltInVoting::CombSumRR, &Default::default()));
    let many = rayon::ThreadPoolBuilder::new()
        .num_threads(8)
        .build()
        .unwrap()
        .install(|| translate(&model, &dict, BuiltInVoting::CombSumRR, &Default::default()));

    assert_eq!(single, many);
}

#[test]
fn round_trips_through_both_formats() -> Result<()> {
    let dir = tempfile::tempdir()?;

    let mut voc = Vocabulary::new(Some(LanguageHint::new("en")));
    voc.add("alpha");
    voc.add("beta");
    round_trip(&voc, dir.path(), "voc", Vocabulary::load)?;

    let mut dictionary = dict(&[("cat", "chat"), ("big", "grand")]);
    dictionary.add(
        DictionaryEntry::new("cat", "minou")
            .with_dictionary(LanguageKind::A, "test-dict")
            .with_unstemmed(LanguageKind::A, "cats", ["plural"]),
    );
    round_trip(&dictionary, dir.path(), "dict", Dictionary::load)?;

    let model = model(&["cat", "big"], &[&[0.25, 0.75], &[0.5, 0.5]]);
    round_trip(&model, dir.path(), "model", TopicModel::load)?;
    Ok(())
}

fn round_trip<T, L>(value: &T, dir: &Path, stem: &str, load: L) -> Result<()>
where
    T: PartialEq + std::fmt::Debug + Saveable,
    L: Fn(&Path) -> topictrans::Result<T>,
{
    let json = dir.join(format!("{stem}.json"));
    let bin = dir.join(format!("{stem}.bin"));
    value.save_to(&json)?;
    value.save_to(&bin)?;
    assert_eq!(&load(&json)?, value);
    assert_eq!(&load(&bin)?, value);
    Ok(())
}

trait Saveable {
    fn save_to(&self, path: &Path) -> topictrans::Result<()>;
}

impl Saveable for Vocabulary {
    fn save_to(&self, path: &Path) -> topictrans::Result<()> {
        self.save(path)
    }
}

impl Saveable for Dictionary {
    fn save_to(&self, path: &Path) -> topictrans::Result<()> {
        self.save(path)
    }
}

impl Saveable for TopicModel {
    fn save_to(&self, path: &Path) -> topictrans::Result<()> {
        self.save(path)
    }
}

#[test]
fn translated_model_survives_persistence() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let model = model(&["cat", "kitten"], &[&[0.3, 0.7]]);
    let dictionary = dict(&[("cat", "chat"), ("kitten", "chaton")]);
    let out = translate(
        &model,
        &dictionary,
        BuiltInVoting::CombSum,
        &Default::default(),
    );

    let path = dir.path().join("translated.tm");
    out.save(&path)?;
    let loaded = TopicModel::load(&path)?;
    assert_eq!(loaded, out);
    assert_eq!(loaded.vocabulary().language(), Some(&LanguageHint::new("fr")));
    Ok(())
}

#[test]
fn stopwords_and_phrases_flow_through_the_processor() {
    let stop: Set<String> = ["the".to_string()].into_iter().collect();
    let phrases: Vocabulary = ["new york"].into_iter().collect();

    let mut builders: Map<LanguageHint, TokenizerBuilder> = Map::default();
    builders.insert(
        LanguageHint::new("en"),
        TokenizerBuilder::new()
            .unicode_segmentation(true)
            .stop_words(stop)
            .phrase_vocabulary(phrases),
    );
    let processor = AlignedArticleProcessor::new(builders);

    let tokens = processor.process_string(&LanguageHint::new("en"), "the streets of new york");
    let surfaces: Vec<&str> = tokens.iter().map(|(s, _)| s.as_str()).collect();
    assert!(surfaces.contains(&"new york"));
}

//! The translation engine: re-projects a topic model onto the target-language
//! vocabulary of a bilingual dictionary, one voting call per (topic,
//! candidate) pair.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::debug;

use crate::dictionary::{Dictionary, LanguageKind, create_topic_model_specific_dictionary};
use crate::error::{Error, Result};
use crate::topic_model::{TopicModel, fill_zeros_and_normalize};
use crate::variables::{Context, VariableProvider, keys};
use crate::vocabulary::Vocabulary;
use crate::voting::{Voting, VotingRegistry};

/// What happens to source words during translation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
pub enum KeepOriginalWord {
    /// Every source word keeps its own mass under its own surface form.
    Always,
    /// Only source words without any dictionary edge keep their mass.
    IfNoTranslation,
    #[default]
    Never,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TranslateConfig {
    /// Replaces zero cells before re-normalization. Defaults to the smallest
    /// positive cell of the translated matrix minus one machine delta.
    pub epsilon: Option<f64>,
    /// Voting scores below this are zeroed.
    pub threshold: Option<f64>,
    pub keep_original_word: KeepOriginalWord,
    /// Caps the voters of each candidate to the top-n by score.
    pub top_candidate_limit: Option<usize>,
}

/// Translates `model` through `dictionary`, aggregating per-candidate voter
/// scores with `voting`. The input model is not touched; topics are processed
/// in parallel with bit-identical results to a sequential run.
pub fn translate_topic_model(
    model: &TopicModel,
    dictionary: &Dictionary,
    voting: &Voting,
    config: &TranslateConfig,
    provider: Option<&VariableProvider>,
    registry: Option<&VotingRegistry>,
) -> Result<TopicModel> {
    if model.vocabulary().is_empty() {
        return Err(Error::invalid_input("the model vocabulary is empty"));
    }
    if dictionary.voc_a().is_empty() && dictionary.voc_b().is_empty() {
        return Err(Error::invalid_input("the dictionary is empty"));
    }

    let subdict = create_topic_model_specific_dictionary(dictionary, model.vocabulary());
    if subdict.is_empty() {
        return Err(Error::invalid_input(
            "the dictionary shares no words with the model vocabulary",
        ));
    }
    debug!(
        edges = subdict.len(),
        candidates = subdict.voc_b().len(),
        "derived topic-specific dictionary"
    );

    // The target vocabulary: every candidate first, then the slots for kept
    // original words. Kept words whose surface collides with a candidate
    // share its slot.
    let mut target_voc = Vocabulary::new(subdict.voc_b().language().cloned());
    for word in subdict.voc_b().iter() {
        target_voc.add(word);
    }
    let mut original_slots: Vec<(usize, usize)> = Vec::new();
    if config.keep_original_word != KeepOriginalWord::Never {
        for (id_a, word) in model.vocabulary().iter().enumerate() {
            let untranslated = subdict.translation_ids_a_to_b(id_a).is_none();
            if config.keep_original_word == KeepOriginalWord::Always || untranslated {
                original_slots.push((id_a, target_voc.add(word)));
            }
        }
    }

    // Voters per candidate, ascending by source id for determinism.
    let voters_per_candidate: Vec<Vec<usize>> = (0..subdict.voc_b().len())
        .map(|candidate| {
            let mut voters: Vec<usize> = subdict
                .translation_ids_b_to_a(candidate)
                .map(|ids| ids.iter().copied().collect())
                .unwrap_or_default();
            voters.sort_unstable();
            voters
        })
        .collect();

    let mut rows: Vec<Vec<f64>> = (0..model.k())
        .into_par_iter()
        .map(|topic| {
            translate_topic(
                model,
                &subdict,
                &target_voc,
                &voters_per_candidate,
                &original_slots,
                voting,
                config,
                provider,
                registry,
                topic,
            )
        })
        .collect::<Result<Vec<_>>>()?;

    fill_zeros_and_normalize(&mut rows, config.epsilon)?;

    let mut frequency = vec![0u64; target_voc.len()];
    for (candidate, voters) in voters_per_candidate.iter().enumerate() {
        for &id_a in voters {
            frequency[candidate] += model.used_vocab_frequency()[id_a];
        }
    }
    for &(id_a, slot) in &original_slots {
        frequency[slot] += model.used_vocab_frequency()[id_a];
    }

    TopicModel::new(
        rows,
        target_voc,
        frequency,
        model.doc_topic_distributions().map(<[_]>::to_vec),
        model.document_lengths().map(<[_]>::to_vec),
    )
}

#[allow(clippy::too_many_arguments)]
fn translate_topic(
    model: &TopicModel,
    subdict: &Dictionary,
    target_voc: &Vocabulary,
    voters_per_candidate: &[Vec<usize>],
    original_slots: &[(usize, usize)],
    voting: &Voting,
    config: &TranslateConfig,
    provider: Option<&VariableProvider>,
    registry: Option<&VotingRegistry>,
    topic: usize,
) -> Result<Vec<f64>> {
    let row_src = model
        .get_topic(topic)
        .ok_or_else(|| Error::InvariantViolation(format!("topic {topic} vanished")))?;
    let stats = model.stats()[topic];

    let mut base_global = Context::new();
    base_global.set(keys::EPSILON, config.epsilon.unwrap_or(f64::EPSILON));
    base_global.set(keys::VOCABULARY_SIZE_A, model.vocabulary().len());
    base_global.set(keys::VOCABULARY_SIZE_B, target_voc.len());
    base_global.set(keys::TOPIC_ID, topic);
    base_global.set(keys::TOPIC_MAX_PROBABILITY, stats.max);
    base_global.set(keys::TOPIC_MIN_PROBABILITY, stats.min);
    base_global.set(keys::TOPIC_AVG_PROBABILITY, stats.avg);
    base_global.set(keys::TOPIC_SUM_PROBABILITY, stats.sum);
    if let Some(provider) = provider {
        provider.apply_global(topic, &mut base_global);
    }

    let mut row = vec![0.0; target_voc.len()];
    for (candidate, voters) in voters_per_candidate.iter().enumerate() {
        if voters.is_empty() {
            continue;
        }

        let mut retained = voters.clone();
        if let Some(limit) = config.top_candidate_limit {
            retained.sort_by(|&a, &b| row_src[b].total_cmp(&row_src[a]).then(a.cmp(&b)));
            retained.truncate(limit);
            retained.sort_unstable();
        }

        // 1-based ranks by score descending, ties by ascending id.
        let mut order: Vec<usize> = (0..retained.len()).collect();
        order.sort_by(|&x, &y| {
            let (a, b) = (retained[x], retained[y]);
            row_src[b].total_cmp(&row_src[a]).then(a.cmp(&b))
        });
        let mut ranks = vec![0usize; retained.len()];
        for (rank0, &pos) in order.iter().enumerate() {
            ranks[pos] = rank0 + 1;
        }

        let candidate_word = subdict.voc_b().id_to_word(candidate).unwrap_or_default();
        let mut voter_ctxs: Vec<Context> = retained
            .iter()
            .enumerate()
            .map(|(pos, &id_a)| {
                let word_a = model.vocabulary().id_to_word(id_a).unwrap_or_default();
                let rank = ranks[pos] as f64;
                let mut ctx = Context::new();
                ctx.set(keys::VOTER_ID, id_a);
                ctx.set(keys::CANDIDATE_ID, candidate);
                ctx.set(keys::HAS_TRANSLATION, true);
                ctx.set(keys::IS_ORIGIN_WORD, word_a == candidate_word);
                ctx.set(keys::SCORE_CANDIDATE, row_src[id_a]);
                ctx.set(keys::RANK, rank);
                ctx.set(keys::RECIPROCAL_RANK, 1.0 / rank);
                ctx.set(keys::REAL_RECIPROCAL_RANK, 1.0 / rank);
                ctx.set(keys::IMPORTANCE, 1.0);
                ctx.set(keys::SCORE, 0.0);
                if let Some(provider) = provider {
                    provider.apply_word(LanguageKind::A, topic, word_a, &mut ctx);
                    provider.apply_word(LanguageKind::B, topic, candidate_word, &mut ctx);
                }
                ctx
            })
            .collect();

        let mut global = base_global.clone();
        global.set(keys::COUNT_OF_VOTERS, voter_ctxs.len());
        global.set(keys::NUMBER_OF_VOTERS, voter_ctxs.len());

        let (mut score, _used) = voting.call(&mut global, &mut voter_ctxs, registry)?;
        if !score.is_finite() || score < 0.0 {
            return Err(Error::invalid_input(format!(
                "voting produced {score} for candidate '{candidate_word}' in topic {topic}"
            )));
        }
        if let Some(threshold) = config.threshold
            && score < threshold
        {
            score = 0.0;
        }
        row[candidate] += score;
    }

    for &(id_a, slot) in original_slots {
        row[slot] += row_src[id_a];
    }

    Ok(row)
}

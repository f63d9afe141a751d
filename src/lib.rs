//! Cross-lingual translation of LDA topic models.
//!
//! Given a trained topic model over a source-language vocabulary and a
//! bilingual dictionary, [`translate_topic_model`] re-projects the per-topic
//! word distributions onto the target-language vocabulary. Every candidate
//! target word is scored by aggregating the topic probabilities of all source
//! words translating to it through a [`voting::Voting`] — a built-in from the
//! comb-fusion family, a parsed expression of the small voting DSL, or a host
//! callback.
//!
//! The second, independent half of the crate is an aligned-corpus pipeline:
//! per-language tokenizer construction ([`tokenize::TokenizerBuilder`]) and
//! the streaming, filtering and bulk packaging of multilingual aligned
//! articles ([`pipeline`]).

pub mod aligned;
mod binfmt;
pub mod dictionary;
pub mod error;
pub mod lang;
pub mod pipeline;
pub mod tokenize;
pub mod topic_model;
pub mod translate;
pub mod variables;
pub mod vocabulary;
pub mod voting;

use fxhash::FxBuildHasher;
use indexmap::{IndexMap, IndexSet};

pub type Map<K, V> = IndexMap<K, V, FxBuildHasher>; // Preserve insertion order
pub type Set<K> = IndexSet<K, FxBuildHasher>;

pub use crate::dictionary::{
    Dictionary, DictionaryEntry, DirectionKind, LanguageKind, SolvedMetadata,
    create_topic_model_specific_dictionary,
};
pub use crate::error::{Error, Result};
pub use crate::lang::LanguageHint;
pub use crate::topic_model::{TopicModel, TopicModelBuilder};
pub use crate::translate::{KeepOriginalWord, TranslateConfig, translate_topic_model};
pub use crate::variables::{Context, VariableProvider};
pub use crate::vocabulary::Vocabulary;
pub use crate::voting::{BuiltInVoting, Voting, VotingRegistry};

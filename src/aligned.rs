//! Aligned multilingual articles and their tokenized form.

use serde::{Deserialize, Serialize};

use crate::Map;
use crate::error::Result;
use crate::lang::LanguageHint;
use crate::tokenize::{Token, Tokenizer, TokenizerBuilder};

fn is_false(b: &bool) -> bool {
    !*b
}

/// One article in one language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub lang: LanguageHint,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_list: bool,
}

impl Article {
    pub fn new(lang: impl Into<LanguageHint>, content: impl Into<String>) -> Self {
        Self {
            lang: lang.into(),
            content: content.into(),
            categories: None,
            is_list: false,
        }
    }

    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = Some(categories);
        self
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Translations of the same article, keyed by language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedArticle {
    pub article_id: u64,
    pub articles: Map<LanguageHint, Article>,
}

impl AlignedArticle {
    pub fn new(article_id: u64, articles: impl IntoIterator<Item = Article>) -> Self {
        Self {
            article_id,
            articles: articles
                .into_iter()
                .map(|article| (article.lang.clone(), article))
                .collect(),
        }
    }

    /// Lookup by hint or raw string; both go through hint normalization.
    pub fn get(&self, lang: impl Into<LanguageHint>) -> Option<&Article> {
        self.articles.get(&lang.into())
    }

    pub fn languages(&self) -> impl Iterator<Item = &LanguageHint> {
        self.articles.keys()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// One tokenized article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenizedArticle {
    pub lang: LanguageHint,
    pub tokens: Vec<(String, Token)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenizedAlignedArticle {
    pub article_id: u64,
    pub articles: Map<LanguageHint, TokenizedArticle>,
}

impl TokenizedAlignedArticle {
    pub fn get(&self, lang: impl Into<LanguageHint>) -> Option<&TokenizedArticle> {
        self.articles.get(&lang.into())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// One tokenizer per language, applied to whole aligned articles.
#[derive(Debug)]
pub struct AlignedArticleProcessor {
    tokenizers: Map<LanguageHint, Tokenizer>,
    fallback: Tokenizer,
}

impl AlignedArticleProcessor {
    pub fn new(builders: Map<LanguageHint, TokenizerBuilder>) -> Self {
        let tokenizers = builders
            .into_iter()
            .map(|(lang, builder)| (lang, builder.build()))
            .collect();
        Self {
            tokenizers,
            // languages without an explicit tokenizer get the default
            fallback: TokenizerBuilder::new().build(),
        }
    }

    pub fn supports(&self, lang: &LanguageHint) -> bool {
        self.tokenizers.contains_key(lang)
    }

    pub fn process(&self, aligned: &AlignedArticle) -> TokenizedAlignedArticle {
        let articles = aligned
            .articles
            .iter()
            .map(|(lang, article)| {
                let tokens = self.process_string(lang, &article.content);
                (
                    lang.clone(),
                    TokenizedArticle {
                        lang: lang.clone(),
                        tokens,
                    },
                )
            })
            .collect();
        TokenizedAlignedArticle {
            article_id: aligned.article_id,
            articles,
        }
    }

    /// Single-string tokenization with the tokenizer of `lang`.
    pub fn process_string(&self, lang: &LanguageHint, text: &str) -> Vec<(String, Token)> {
        self.tokenizers
            .get(lang)
            .unwrap_or(&self.fallback)
            .tokenize(Some(lang), text)
    }
}

//! Streaming and bulk processing of aligned-article corpora.
//!
//! The on-disk representation of a corpus is JSON lines, one aligned article
//! per line. Readers are restartable and lazy: the underlying file is opened
//! on the first iteration step and released when the iterator is dropped.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use tracing::debug;
use xz2::read::XzDecoder;
use xz2::write::XzEncoder;

use crate::aligned::{AlignedArticle, AlignedArticleProcessor, TokenizedAlignedArticle};
use crate::error::Result;
use crate::tokenize::TokenKind;

/// Keeps articles whose per-language token counts all fall inside
/// `[min, max]`. Separator tokens do not count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenCountFilter {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl TokenCountFilter {
    pub fn new(min: Option<usize>, max: Option<usize>) -> Self {
        Self { min, max }
    }

    pub fn accepts_count(&self, count: usize) -> bool {
        self.min.is_none_or(|min| count >= min) && self.max.is_none_or(|max| count <= max)
    }

    /// False when any language of the article falls outside the bounds.
    pub fn accepts(&self, article: &TokenizedAlignedArticle) -> bool {
        article.articles.values().all(|tokenized| {
            let count = tokenized
                .tokens
                .iter()
                .filter(|(_, token)| {
                    !matches!(
                        token.kind,
                        TokenKind::SeparatorHard | TokenKind::SeparatorSoft
                    )
                })
                .count();
            self.accepts_count(count)
        })
    }
}

/// On-disk behavior of the bulk pipeline.
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Defaults to the system temp directory.
    pub temp_folder: Option<PathBuf>,
    /// Deflate each temp file as it is written.
    pub deflate_temp_files: bool,
    /// Unlink each temp file right after it is appended to the output.
    pub delete_temp_files_immediately: bool,
    /// Wrap the bulk output in LZMA.
    pub compress_result: bool,
}

/// A restartable JSON-lines source. Every call to [`JsonLinesReader::iter`]
/// starts over from the beginning of the file.
#[derive(Debug, Clone)]
pub struct JsonLinesReader<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> JsonLinesReader<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn iter(&self) -> JsonLinesIter<T> {
        JsonLinesIter {
            path: self.path.clone(),
            reader: None,
            line: Vec::with_capacity(1 << 10),
            done: false,
            _marker: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> IntoIterator for &JsonLinesReader<T> {
    type Item = Result<T>;
    type IntoIter = JsonLinesIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct JsonLinesIter<T> {
    path: PathBuf,
    reader: Option<BufReader<File>>,
    line: Vec<u8>,
    done: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Iterator for JsonLinesIter<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.reader.is_none() {
            match File::open(&self.path) {
                Ok(file) => self.reader = Some(BufReader::with_capacity(256 * (1 << 10), file)),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }
        }
        let reader = self.reader.as_mut()?;

        loop {
            self.line.clear();
            match reader.read_until(b'\n', &mut self.line) {
                Ok(0) => {
                    self.done = true;
                    self.reader = None;
                    return None;
                }
                Ok(_) => {
                    if self.line.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    return match serde_json::from_slice(&self.line) {
                        Ok(value) => Some(Ok(value)),
                        Err(e) => {
                            self.done = true;
                            Some(Err(e.into()))
                        }
                    };
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }
        }
    }
}

/// Lazily yields the aligned articles stored at `path`.
pub fn read_aligned_articles(path: impl Into<PathBuf>) -> JsonLinesReader<AlignedArticle> {
    JsonLinesReader::new(path)
}

/// Lazily yields already-tokenized aligned articles stored at `path`.
pub fn read_aligned_parsed_articles(
    path: impl Into<PathBuf>,
) -> JsonLinesReader<TokenizedAlignedArticle> {
    JsonLinesReader::new(path)
}

/// Lazily yields the articles of `path` tokenized through `processor`.
pub fn read_and_parse_aligned_articles<'a>(
    path: impl Into<PathBuf>,
    processor: &'a AlignedArticleProcessor,
) -> impl Iterator<Item = Result<TokenizedAlignedArticle>> + 'a {
    read_aligned_articles(path)
        .iter()
        .map(move |article| article.map(|a| processor.process(&a)))
}

enum BulkSink {
    Plain(BufWriter<File>),
    Xz(Box<XzEncoder<BufWriter<File>>>),
}

impl BulkSink {
    fn create(path: &Path, compress: bool) -> Result<Self> {
        let writer = BufWriter::new(File::create(path)?);
        Ok(if compress {
            Self::Xz(Box::new(XzEncoder::new(writer, 6)))
        } else {
            Self::Plain(writer)
        })
    }

    fn write_frame(&mut self, payload: &[u8]) -> Result<()> {
        let writer: &mut dyn Write = match self {
            Self::Plain(w) => w,
            Self::Xz(w) => w.as_mut(),
        };
        writer.write_all(&(payload.len() as u64).to_le_bytes())?;
        writer.write_all(payload)?;
        Ok(())
    }

    fn finish(self) -> Result<()> {
        match self {
            Self::Plain(mut w) => w.flush()?,
            Self::Xz(w) => {
                w.finish()?.flush()?;
            }
        }
        Ok(())
    }
}

static BULK_RUN: AtomicU64 = AtomicU64::new(0);

/// Tokenizes and filters an aligned corpus into a single packaged output.
///
/// Every surviving article is first written to its own temp file, then the
/// temp files are concatenated into `path_out` as length-prefixed frames,
/// optionally LZMA-wrapped. Returns the number of surviving articles. Any
/// error aborts the run after a best-effort cleanup of the temp files.
#[tracing::instrument(skip_all)]
pub fn read_and_parse_aligned_articles_into(
    path_in: &Path,
    path_out: &Path,
    processor: &AlignedArticleProcessor,
    filter: Option<TokenCountFilter>,
    store: StoreOptions,
) -> Result<usize> {
    let temp_root = store
        .temp_folder
        .clone()
        .unwrap_or_else(std::env::temp_dir);
    let temp_dir = temp_root.join(format!(
        "topictrans-bulk-{}-{}",
        std::process::id(),
        BULK_RUN.fetch_add(1, Ordering::Relaxed)
    ));
    fs::create_dir_all(&temp_dir)?;

    let result = bulk_run(path_in, path_out, processor, filter, &store, &temp_dir);
    // temp files of a successful run are consumed below; this only catches
    // leftovers of a failed one
    let _ = fs::remove_dir_all(&temp_dir);
    result
}

fn bulk_run(
    path_in: &Path,
    path_out: &Path,
    processor: &AlignedArticleProcessor,
    filter: Option<TokenCountFilter>,
    store: &StoreOptions,
    temp_dir: &Path,
) -> Result<usize> {
    const CHUNK: usize = 64;

    let mut sink = BulkSink::create(path_out, store.compress_result)?;
    let mut pending: Vec<PathBuf> = Vec::new();
    let mut kept = 0usize;
    let mut seen = 0usize;
    let mut chunk: Vec<AlignedArticle> = Vec::with_capacity(CHUNK);

    let mut flush = |chunk: &mut Vec<AlignedArticle>,
                     kept: &mut usize,
                     pending: &mut Vec<PathBuf>,
                     sink: &mut BulkSink|
     -> Result<()> {
        // tokenization fans out; collect keeps article order
        let tokenized: Vec<TokenizedAlignedArticle> =
            chunk.par_iter().map(|a| processor.process(a)).collect();
        chunk.clear();

        for article in tokenized {
            if let Some(filter) = &filter
                && !filter.accepts(&article)
            {
                continue;
            }
            *kept += 1;

            let temp_path = temp_dir.join(format!("art-{:08}.tmp", *kept));
            let payload = serde_json::to_vec(&article)?;
            if store.deflate_temp_files {
                let mut encoder =
                    DeflateEncoder::new(BufWriter::new(File::create(&temp_path)?), Compression::default());
                encoder.write_all(&payload)?;
                encoder.finish()?.flush()?;
            } else {
                fs::write(&temp_path, &payload)?;
            }

            if store.delete_temp_files_immediately {
                sink.write_frame(&fs::read(&temp_path)?)?;
                fs::remove_file(&temp_path)?;
            } else {
                pending.push(temp_path);
            }
        }
        Ok(())
    };

    for article in read_aligned_articles(path_in).iter() {
        chunk.push(article?);
        seen += 1;
        if chunk.len() == CHUNK {
            flush(&mut chunk, &mut kept, &mut pending, &mut sink)?;
        }
    }
    flush(&mut chunk, &mut kept, &mut pending, &mut sink)?;

    for temp_path in pending {
        sink.write_frame(&fs::read(&temp_path)?)?;
        fs::remove_file(&temp_path)?;
    }
    sink.finish()?;

    debug!(seen, kept, "bulk processing finished");
    Ok(kept)
}

/// Reads a bulk output back: length-prefixed frames, each a (possibly
/// deflated) tokenized aligned article, the whole stream possibly
/// LZMA-wrapped.
pub fn read_bulk_tokenized_articles(
    path: &Path,
    deflated: bool,
    compressed: bool,
) -> Result<Vec<TokenizedAlignedArticle>> {
    let file = BufReader::new(File::open(path)?);
    let mut reader: Box<dyn Read> = if compressed {
        Box::new(XzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let mut articles = Vec::new();
    loop {
        let mut len_bytes = [0u8; 8];
        match reader.read_exact(&mut len_bytes) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
        let len = u64::from_le_bytes(len_bytes) as usize;
        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload)?;

        let article = if deflated {
            let mut decoded = Vec::new();
            DeflateDecoder::new(payload.as_slice()).read_to_end(&mut decoded)?;
            serde_json::from_slice(&decoded)?
        } else {
            serde_json::from_slice(&payload)?
        };
        articles.push(article);
    }
    Ok(articles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Map;
    use crate::aligned::Article;
    use crate::lang::LanguageHint;
    use crate::tokenize::TokenizerBuilder;

    fn write_corpus(path: &Path, articles: &[AlignedArticle]) {
        let mut out = String::new();
        for article in articles {
            out.push_str(&article.to_json().unwrap());
            out.push('\n');
        }
        fs::write(path, out).unwrap();
    }

    fn corpus() -> Vec<AlignedArticle> {
        let words = |n: usize| {
            (0..n)
                .map(|i| format!("word{i}"))
                .collect::<Vec<_>>()
                .join(" ")
        };
        vec![
            AlignedArticle::new(0, [Article::new("en", words(2)), Article::new("de", words(30))]),
            AlignedArticle::new(1, [Article::new("en", words(50)), Article::new("de", words(40))]),
            AlignedArticle::new(2, [Article::new("en", words(500)), Article::new("de", words(60))]),
        ]
    }

    fn processor() -> AlignedArticleProcessor {
        let mut builders: Map<LanguageHint, TokenizerBuilder> = Map::default();
        for lang in ["en", "de"] {
            builders.insert(
                LanguageHint::new(lang),
                TokenizerBuilder::new().unicode_segmentation(true),
            );
        }
        AlignedArticleProcessor::new(builders)
    }

    #[test]
    fn reader_is_lazy_and_restartable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.jsonl");
        write_corpus(&path, &corpus());

        let reader = read_aligned_articles(&path);
        let first: Vec<u64> = reader
            .iter()
            .map(|r| r.unwrap().article_id)
            .collect();
        let second: Vec<u64> = reader
            .iter()
            .map(|r| r.unwrap().article_id)
            .collect();
        assert_eq!(first, vec![0, 1, 2]);
        assert_eq!(first, second);

        // missing files only fail on iteration
        let missing = read_aligned_articles(dir.path().join("nope.jsonl"));
        assert!(missing.iter().next().unwrap().is_err());
    }

    #[test]
    fn token_count_filter_bounds() {
        let filter = TokenCountFilter::new(Some(10), Some(200));
        assert!(!filter.accepts_count(2));
        assert!(filter.accepts_count(50));
        assert!(!filter.accepts_count(500));
        let open_ended = TokenCountFilter::new(Some(1), None);
        assert!(open_ended.accepts_count(10_000));
    }

    #[test]
    fn bulk_filters_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path_in = dir.path().join("corpus.jsonl");
        let path_out = dir.path().join("bulk.bin");
        write_corpus(&path_in, &corpus());

        let kept = read_and_parse_aligned_articles_into(
            &path_in,
            &path_out,
            &processor(),
            Some(TokenCountFilter::new(Some(10), Some(200))),
            StoreOptions {
                temp_folder: Some(dir.path().to_path_buf()),
                ..Default::default()
            },
        )
        .unwrap();

        // only the all-mid-sized article survives: article 0 has a 2-token
        // side, article 2 a 500-token side
        assert_eq!(kept, 1);
        let stored = read_bulk_tokenized_articles(&path_out, false, false).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].article_id, 1);
    }

    #[test]
    fn bulk_round_trips_with_compression() {
        let dir = tempfile::tempdir().unwrap();
        let path_in = dir.path().join("corpus.jsonl");
        let path_out = dir.path().join("bulk.xz");
        write_corpus(&path_in, &corpus());

        let kept = read_and_parse_aligned_articles_into(
            &path_in,
            &path_out,
            &processor(),
            None,
            StoreOptions {
                temp_folder: Some(dir.path().to_path_buf()),
                deflate_temp_files: true,
                delete_temp_files_immediately: true,
                compress_result: true,
            },
        )
        .unwrap();
        assert_eq!(kept, 3);

        let stored = read_bulk_tokenized_articles(&path_out, true, true).unwrap();
        assert_eq!(stored.len(), 3);
        let direct: Vec<TokenizedAlignedArticle> =
            read_and_parse_aligned_articles(&path_in, &processor())
                .map(|r| r.unwrap())
                .collect();
        assert_eq!(stored, direct);
    }

    #[test]
    fn bulk_cleans_its_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path_in = dir.path().join("corpus.jsonl");
        let path_out = dir.path().join("bulk.bin");
        write_corpus(&path_in, &corpus());

        read_and_parse_aligned_articles_into(
            &path_in,
            &path_out,
            &processor(),
            None,
            StoreOptions {
                temp_folder: Some(dir.path().to_path_buf()),
                ..Default::default()
            },
        )
        .unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("topictrans-bulk"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn parse_errors_abort_the_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jsonl");
        fs::write(&path, "{not json}\n").unwrap();
        let mut iter = read_aligned_articles(&path).iter();
        assert!(iter.next().unwrap().is_err());
        assert!(iter.next().is_none());
    }
}

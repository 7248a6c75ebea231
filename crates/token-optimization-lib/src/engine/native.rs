//! In-process implementation of [`TokenOptimizer`].
//!
//! Rewrites are built from small passes over Unicode word segments:
//!
//! - Conservative: whitespace normalization + abbreviation substitution.
//! - Balanced: Conservative + stop-word removal.
//! - Aggressive: Balanced + removal of immediately repeated words and
//!   repeated punctuation.
//! - Lossless mode: whitespace cleanup only, independent of the level.
//!
//! No pass ever lengthens its input, so `optimized_count <= original_count`.
//! Every pass is line-local: phrases, stop words and repeats never match
//! across a line break. Results of full rewrites are memoised in an LRU cache.
//! A text that appends new lines to one of the last few inputs (within the
//! configured window) reuses that input's output and only rewrites the new
//! lines; these are counted as incremental updates and are not memoised.
//
// Rust guideline compliant 2026-02-13

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use lru::LruCache;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use super::{Dictionary, EngineSettings, TextMode, TokenOptimizer, MAX_BATCH_REQUESTS};
use crate::error::TokenOptimizationError;
use crate::model::optimization_config::CompressionLevel;
use crate::model::optimization_stats::{savings_percent, BatchResult, OptimizationStats};

/// Number of memoised rewrites.
pub const CACHE_CAPACITY: usize = 10_000;
/// Number of recent inputs considered for incremental updates.
const SNAPSHOT_CAPACITY: usize = 5;

static TRAILING_SPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)[ \t]+$").expect("static pattern"));
static LEADING_SPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]+").expect("static pattern"));
static BLANK_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("static pattern"));
static SPACE_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]{2,}").expect("static pattern"));
static SPACE_BEFORE_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]+([,.;:!?])").expect("static pattern"));

/// Rewrite pipeline a text goes through; part of the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Pipeline {
    Lossless,
    Semantic(CompressionLevel),
}

#[derive(Debug)]
struct Snapshot {
    pipeline: Pipeline,
    input: String,
    output: String,
    taken_at: Instant,
}

#[derive(Debug, Default)]
struct Counters {
    calls: AtomicU64,
    batches: AtomicU64,
    chars_in: AtomicU64,
    chars_out: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    incremental_updates: AtomicU64,
    latency_micros: AtomicU64,
}

/// Pure-Rust token optimizer.
#[derive(Debug)]
pub struct NativeOptimizer {
    settings: RwLock<EngineSettings>,
    dictionary: RwLock<Dictionary>,
    cache: Mutex<LruCache<(Pipeline, String), String>>,
    snapshots: Mutex<VecDeque<Snapshot>>,
    counters: Counters,
    batch_seq: AtomicU64,
    disposed: AtomicBool,
}

impl NativeOptimizer {
    /// Create an engine with the given batch size, window (ms) and semantic mode.
    pub fn new(batch_size: usize, window_size_ms: u64, semantic_mode: bool) -> Self {
        Self::with_settings(EngineSettings::new(batch_size, window_size_ms, semantic_mode))
    }

    pub fn with_settings(settings: EngineSettings) -> Self {
        let capacity = NonZeroUsize::new(CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            settings: RwLock::new(settings),
            dictionary: RwLock::new(Dictionary::with_defaults()),
            cache: Mutex::new(LruCache::new(capacity)),
            snapshots: Mutex::new(VecDeque::with_capacity(SNAPSHOT_CAPACITY)),
            counters: Counters::default(),
            batch_seq: AtomicU64::new(0),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings.read().clone()
    }

    /// Optimize `text` and return the rewritten text along with its stats.
    pub fn compress(
        &self,
        text: &str,
        mode: Option<TextMode>,
    ) -> Result<(String, OptimizationStats), TokenOptimizationError> {
        self.ensure_live()?;
        let started = Instant::now();
        let (pipeline, window) = {
            let settings = self.settings.read();
            let mode = mode.unwrap_or_else(|| settings.default_mode());
            (
                pipeline_for(mode, settings.compression_level),
                Duration::from_millis(settings.window_size_ms),
            )
        };

        let optimized = match self.cached(pipeline, text) {
            Some(hit) => hit,
            None => {
                let optimized = match self.incremental(pipeline, text, window) {
                    Some(optimized) => {
                        self.counters
                            .incremental_updates
                            .fetch_add(1, Ordering::Relaxed);
                        optimized
                    }
                    None => {
                        let optimized = self.rewrite(pipeline, text);
                        self.cache
                            .lock()
                            .put((pipeline, text.to_string()), optimized.clone());
                        optimized
                    }
                };
                self.remember(pipeline, text, &optimized);
                optimized
            }
        };

        let original_count = char_count(text);
        let optimized_count = char_count(&optimized);
        self.record_call(original_count, optimized_count, started);
        let stats = OptimizationStats::from_counts(
            original_count,
            optimized_count,
            self.counters.cache_hits.load(Ordering::Relaxed),
            self.counters.incremental_updates.load(Ordering::Relaxed),
        );
        Ok((optimized, stats))
    }

    fn ensure_live(&self) -> Result<(), TokenOptimizationError> {
        if self.disposed.load(Ordering::Acquire) {
            Err(TokenOptimizationError::Disposed)
        } else {
            Ok(())
        }
    }

    fn cached(&self, pipeline: Pipeline, text: &str) -> Option<String> {
        let hit = self
            .cache
            .lock()
            .get(&(pipeline, text.to_string()))
            .cloned();
        match hit {
            Some(_) => self.counters.cache_hits.fetch_add(1, Ordering::Relaxed),
            None => self.counters.cache_misses.fetch_add(1, Ordering::Relaxed),
        };
        hit
    }

    /// Reuse the output of a recent input that `text` extends by whole lines.
    ///
    /// Extensions of the base's last line go through a full rewrite, since a
    /// phrase or a repeat may span the old and new text.
    fn incremental(&self, pipeline: Pipeline, text: &str, window: Duration) -> Option<String> {
        if pipeline == Pipeline::Lossless {
            return None;
        }
        let snapshots = self.snapshots.lock();
        let base = snapshots.iter().rev().find(|snap| {
            snap.pipeline == pipeline
                && snap.taken_at.elapsed() <= window
                && text.len() > snap.input.len()
                && text.starts_with(snap.input.as_str())
                && line_breaks_before_content(&text[snap.input.len()..]) > 0
        })?;

        let suffix = &text[base.input.len()..];
        let separator = if line_breaks_before_content(suffix) == 1 {
            "\n"
        } else {
            "\n\n"
        };
        let rewritten = self.rewrite(pipeline, suffix);
        let mut out = base.output.clone();
        if !out.is_empty() && !rewritten.is_empty() {
            out.push_str(separator);
        }
        out.push_str(&rewritten);
        Some(out)
    }

    fn remember(&self, pipeline: Pipeline, input: &str, output: &str) {
        let mut snapshots = self.snapshots.lock();
        if snapshots.len() >= SNAPSHOT_CAPACITY {
            snapshots.pop_front();
        }
        snapshots.push_back(Snapshot {
            pipeline,
            input: input.to_string(),
            output: output.to_string(),
            taken_at: Instant::now(),
        });
    }

    /// Cache-aware rewrite used by batches (no snapshots).
    fn rewrite_cached(&self, pipeline: Pipeline, text: &str) -> String {
        if let Some(hit) = self.cached(pipeline, text) {
            return hit;
        }
        let optimized = self.rewrite(pipeline, text);
        self.cache
            .lock()
            .put((pipeline, text.to_string()), optimized.clone());
        optimized
    }

    fn rewrite(&self, pipeline: Pipeline, text: &str) -> String {
        let level = match pipeline {
            Pipeline::Lossless => return normalize_lossless(text),
            Pipeline::Semantic(level) => level,
        };

        let dictionary = self.dictionary.read();
        let normalized = normalize_semantic(text);
        let mut out = dictionary.abbreviate(&normalized).into_owned();
        if matches!(level, CompressionLevel::Balanced | CompressionLevel::Aggressive) {
            out = normalize_semantic(&drop_stop_words(&out, &dictionary));
        }
        if level == CompressionLevel::Aggressive {
            out = collapse_punctuation(&drop_repeated_words(&out));
        }
        out
    }

    fn record_call(&self, original: u64, optimized: u64, started: Instant) {
        let c = &self.counters;
        c.calls.fetch_add(1, Ordering::Relaxed);
        c.chars_in.fetch_add(original, Ordering::Relaxed);
        c.chars_out.fetch_add(optimized, Ordering::Relaxed);
        let micros = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        c.latency_micros.fetch_add(micros, Ordering::Relaxed);
    }

    /// Forget memoised results and snapshots after the dictionary changed.
    fn invalidate(&self) {
        self.cache.lock().clear();
        self.snapshots.lock().clear();
    }

    fn next_batch_id(&self) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let seq = self.batch_seq.fetch_add(1, Ordering::Relaxed);
        format!("batch-{millis}-{seq}")
    }
}

impl TokenOptimizer for NativeOptimizer {
    fn optimize_text_with_mode(
        &self,
        text: &str,
        mode: Option<TextMode>,
    ) -> Result<OptimizationStats, TokenOptimizationError> {
        self.compress(text, mode).map(|(_, stats)| stats)
    }

    fn optimize_batch(&self, requests: &[String]) -> Result<BatchResult, TokenOptimizationError> {
        self.ensure_live()?;
        if requests.is_empty() {
            return Err(TokenOptimizationError::EmptyBatch);
        }
        if requests.len() > MAX_BATCH_REQUESTS {
            return Err(TokenOptimizationError::BatchTooLarge {
                len: requests.len(),
                limit: MAX_BATCH_REQUESTS,
            });
        }

        let started = Instant::now();
        let (pipeline, chunk) = {
            let settings = self.settings.read();
            (
                pipeline_for(settings.default_mode(), settings.compression_level),
                settings.batch_size.max(1),
            )
        };

        let optimized_requests: Vec<String> = requests
            .par_iter()
            .with_min_len(chunk)
            .map(|request| self.rewrite_cached(pipeline, request))
            .collect();

        let original_count: u64 = requests.iter().map(|r| char_count(r)).sum();
        let optimized_count: u64 = optimized_requests.iter().map(|r| char_count(r)).sum();
        self.record_call(original_count, optimized_count, started);
        self.counters.batches.fetch_add(1, Ordering::Relaxed);

        let batch_id = self.next_batch_id();
        log::debug!(
            "batch {batch_id}: {} requests, {original_count} -> {optimized_count} chars",
            requests.len()
        );

        Ok(BatchResult {
            batch_id,
            optimized_requests,
            stats: OptimizationStats::from_counts(
                original_count,
                optimized_count,
                self.counters.cache_hits.load(Ordering::Relaxed),
                self.counters.incremental_updates.load(Ordering::Relaxed),
            ),
        })
    }

    fn add_abbreviation(&self, full: &str, abbr: &str) -> Result<(), TokenOptimizationError> {
        self.ensure_live()?;
        if self.dictionary.write().add_abbreviation(full, abbr)? {
            self.invalidate();
        }
        Ok(())
    }

    fn add_stop_word(&self, word: &str) -> Result<(), TokenOptimizationError> {
        self.ensure_live()?;
        if self.dictionary.write().add_stop_word(word)? {
            self.invalidate();
        }
        Ok(())
    }

    fn get_performance_stats(&self) -> Result<String, TokenOptimizationError> {
        self.ensure_live()?;
        let c = &self.counters;
        let calls = c.calls.load(Ordering::Relaxed);
        let chars_in = c.chars_in.load(Ordering::Relaxed);
        let chars_out = c.chars_out.load(Ordering::Relaxed);
        let mean_latency_ms = if calls == 0 {
            0.0
        } else {
            c.latency_micros.load(Ordering::Relaxed) as f64 / calls as f64 / 1000.0
        };
        let settings = self.settings.read().clone();
        let dictionary = self.dictionary.read();

        let mut out = String::from("# Token Optimizer Performance\n");
        out.push_str(&format!(
            "- calls: {} (batches: {})\n",
            calls,
            c.batches.load(Ordering::Relaxed)
        ));
        out.push_str(&format!(
            "- characters: {} in, {} out ({:.2}% saved)\n",
            chars_in,
            chars_out,
            savings_percent(chars_in, chars_out)
        ));
        out.push_str(&format!("- {}\n", self.cache_line()));
        out.push_str(&format!(
            "- incremental updates: {}\n",
            c.incremental_updates.load(Ordering::Relaxed)
        ));
        out.push_str(&format!("- mean latency: {mean_latency_ms:.3} ms\n"));
        out.push_str(&format!(
            "- dictionary: {} abbreviations, {} stop words\n",
            dictionary.abbreviation_count(),
            dictionary.stop_word_count()
        ));
        out.push_str(&format!(
            "- settings: level={}, semantic_mode={}, batch_size={}, window={} ms\n",
            settings.compression_level,
            settings.semantic_mode,
            settings.batch_size,
            settings.window_size_ms
        ));
        Ok(out)
    }

    fn get_cache_stats(&self) -> Result<String, TokenOptimizationError> {
        self.ensure_live()?;
        Ok(self.cache_line())
    }

    fn clear_cache(&self) -> Result<(), TokenOptimizationError> {
        self.ensure_live()?;
        self.invalidate();
        Ok(())
    }

    fn reconfigure(&self, settings: &EngineSettings) -> Result<(), TokenOptimizationError> {
        self.ensure_live()?;
        *self.settings.write() = settings.clone();
        Ok(())
    }

    fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            self.invalidate();
            log::debug!("native optimizer disposed");
        }
    }
}

impl NativeOptimizer {
    fn cache_line(&self) -> String {
        let (len, cap) = {
            let cache = self.cache.lock();
            (cache.len(), cache.cap().get())
        };
        let hits = self.counters.cache_hits.load(Ordering::Relaxed);
        let misses = self.counters.cache_misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            hits as f64 / lookups as f64 * 100.0
        };
        format!("cache: {len}/{cap} entries, {hits} hits, {misses} misses ({hit_rate:.1}% hit rate)")
    }
}

fn pipeline_for(mode: TextMode, level: CompressionLevel) -> Pipeline {
    match mode {
        TextMode::Lossless => Pipeline::Lossless,
        TextMode::Semantic => Pipeline::Semantic(level),
    }
}

/// Line breaks in the whitespace that starts `text`.
fn line_breaks_before_content(text: &str) -> usize {
    text.chars()
        .take_while(|c| c.is_whitespace())
        .filter(|&c| c == '\n')
        .count()
}

fn char_count(text: &str) -> u64 {
    text.chars().count() as u64
}

fn is_word(segment: &str) -> bool {
    segment.chars().any(char::is_alphanumeric)
}

/// Strip trailing spaces, cap blank lines at one, trim the ends.
fn normalize_lossless(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let text = TRAILING_SPACE.replace_all(&text, "");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Lossless cleanup plus indentation removal, single spacing and no space
/// before punctuation.
fn normalize_semantic(text: &str) -> String {
    let text = normalize_lossless(text);
    let text = LEADING_SPACE.replace_all(&text, "");
    let text = SPACE_RUNS.replace_all(&text, " ");
    let text = SPACE_BEFORE_PUNCT.replace_all(&text, "$1");
    text.trim().to_string()
}

fn drop_stop_words(text: &str, dictionary: &Dictionary) -> String {
    text.split_word_bounds()
        .filter(|segment| !(is_word(segment) && dictionary.is_stop_word(segment)))
        .collect()
}

/// Drop a word that repeats the previous one across plain spaces.
///
/// Words containing digits are kept: "1 1" is data, not a stutter.
fn drop_repeated_words(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous: Option<String> = None;
    let mut pending_space = String::new();

    for segment in text.split_word_bounds() {
        if is_word(segment) {
            let lowered = segment.to_lowercase();
            let repeated = previous.as_deref() == Some(lowered.as_str())
                && !pending_space.is_empty()
                && !pending_space.contains('\n')
                && !segment.chars().any(|c| c.is_numeric());
            if repeated {
                pending_space.clear();
                continue;
            }
            out.push_str(&pending_space);
            pending_space.clear();
            out.push_str(segment);
            previous = Some(lowered);
        } else if segment.chars().all(char::is_whitespace) {
            pending_space.push_str(segment);
        } else {
            out.push_str(&pending_space);
            pending_space.clear();
            out.push_str(segment);
            previous = None;
        }
    }
    out.push_str(&pending_space);
    out
}

/// Collapse runs of `!`, `?`, `,` and `;`. Periods are kept for ellipses and decimals.
fn collapse_punctuation(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last: Option<char> = None;
    for c in text.chars() {
        if matches!(c, '!' | '?' | ',' | ';') && last == Some(c) {
            continue;
        }
        out.push(c);
        last = Some(c);
    }
    out
}

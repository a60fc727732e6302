//! Parallel conversion of many documents.

use crate::options::ConvertOptions;
use crate::plugin::Plugin;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

/// Builds a fresh plugin list for each document.
pub type PluginFactory = Arc<dyn Fn() -> Vec<Box<dyn Plugin>> + Send + Sync>;

/// One document to convert.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchInput {
    /// Caller-chosen identifier, echoed in the result.
    pub id: String,
    /// HTML source.
    pub html: String,
}

/// Conversion result for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    /// Identifier from the input.
    pub id: String,
    /// Converted Markdown.
    pub markdown: String,
}

/// Aggregate numbers for a batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStats {
    /// Documents converted.
    pub total: u32,
    /// Wall-clock time for the whole batch.
    pub processing_time_ms: f64,
}

/// Options shared by every document in a batch.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOptions {
    /// Base URL for relative links and images.
    #[serde(default)]
    pub origin: Option<String>,
    /// Worker threads; the global pool is used when unset.
    #[serde(default)]
    pub max_threads: Option<usize>,
    /// Plugin factory, called once per document.
    #[serde(skip)]
    pub plugins: Option<PluginFactory>,
}

impl std::fmt::Debug for BatchOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchOptions")
            .field("origin", &self.origin)
            .field("max_threads", &self.max_threads)
            .field("plugins", &self.plugins.is_some())
            .finish()
    }
}

/// Results, in input order, plus stats.
#[derive(Debug, Clone, Serialize)]
pub struct BatchProcessingResult {
    /// Per-document results.
    pub results: Vec<BatchResult>,
    /// Aggregate numbers.
    pub stats: BatchStats,
}

/// Convert every input in parallel.
///
/// Each document gets its own parse state and its own plugin instances, so
/// no state is shared between workers.
pub fn convert_batch(inputs: Vec<BatchInput>, options: &BatchOptions) -> BatchProcessingResult {
    let start = Instant::now();

    let pool = options.max_threads.and_then(|threads| {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|error| log::debug!("falling back to the global pool: {error}"))
            .ok()
    });

    let converted = AtomicU32::new(0);
    let process_input = |input: BatchInput| -> BatchResult {
        let convert = ConvertOptions {
            origin: options.origin.clone(),
            plugins: options
                .plugins
                .as_ref()
                .map(|factory| factory())
                .unwrap_or_default(),
        };
        let markdown = crate::html_to_markdown(&input.html, convert);
        converted.fetch_add(1, Ordering::Relaxed);
        BatchResult {
            id: input.id,
            markdown,
        }
    };

    let results: Vec<BatchResult> = if let Some(pool) = pool {
        pool.install(|| inputs.into_par_iter().map(process_input).collect())
    } else {
        inputs.into_par_iter().map(process_input).collect()
    };

    let elapsed = start.elapsed();
    let total = converted.load(Ordering::Relaxed);
    log::debug!("converted {total} documents in {elapsed:?}");
    BatchProcessingResult {
        results,
        stats: BatchStats {
            total,
            processing_time_ms: elapsed.as_secs_f64() * 1000.0,
        },
    }
}

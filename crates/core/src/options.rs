//! Conversion and splitting options.

use crate::error::ConfigError;
use crate::plugin::Plugin;
use crate::tags::TagId;
use serde::Deserialize;
use std::sync::Arc;

/// Options for a single conversion.
///
/// Plugins are runtime-only; everything else can be deserialized from
/// camelCase keys.
#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertOptions {
    /// Base URL for relative links and images.
    #[serde(default)]
    pub origin: Option<String>,
    /// Plugins, invoked in order.
    #[serde(skip)]
    pub plugins: Vec<Box<dyn Plugin>>,
}

impl std::fmt::Debug for ConvertOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvertOptions")
            .field("origin", &self.origin)
            .field("plugins", &self.plugins.len())
            .finish()
    }
}

impl ConvertOptions {
    /// Options with no origin and no plugins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the origin used to resolve relative URLs.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Append a plugin.
    pub fn with_plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }
}

/// Measures chunk length. Must be monotonic in the input length.
#[derive(Clone)]
pub struct LengthFunction(Arc<dyn Fn(&str) -> usize + Send + Sync>);

impl LengthFunction {
    /// Wrap a measuring function.
    pub fn new(measure: impl Fn(&str) -> usize + Send + Sync + 'static) -> Self {
        Self(Arc::new(measure))
    }

    /// Length of `text`.
    pub fn measure(&self, text: &str) -> usize {
        (self.0)(text)
    }
}

impl Default for LengthFunction {
    fn default() -> Self {
        Self::new(|text| text.chars().count())
    }
}

impl std::fmt::Debug for LengthFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LengthFunction")
    }
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_headers() -> Vec<TagId> {
    vec![TagId::H1, TagId::H2, TagId::H3]
}

fn default_true() -> bool {
    true
}

/// Options for [`crate::html_to_markdown_split_chunks`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitterOptions {
    /// Maximum chunk length, in units of the length function.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Trailing length carried into the next chunk on size splits.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Headings that start a new chunk.
    #[serde(default = "default_headers")]
    pub headers_to_split_on: Vec<TagId>,
    /// Remove heading lines from chunk content.
    #[serde(default = "default_true")]
    pub strip_headers: bool,
    /// Emit every line as its own chunk.
    #[serde(default)]
    pub return_each_line: bool,
    /// Length measure.
    #[serde(skip)]
    pub length_function: LengthFunction,
    /// Conversion options.
    #[serde(flatten)]
    pub convert: ConvertOptions,
}

impl Default for SplitterOptions {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            headers_to_split_on: default_headers(),
            strip_headers: true,
            return_each_line: false,
            length_function: LengthFunction::default(),
            convert: ConvertOptions::default(),
        }
    }
}

impl SplitterOptions {
    /// Reject settings the splitter cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::OverlapTooLarge {
                overlap: self.chunk_overlap,
                size: self.chunk_size,
            });
        }
        Ok(())
    }

    pub(crate) fn splits_on(&self, tag: TagId) -> bool {
        tag.heading_level().is_some() && self.headers_to_split_on.contains(&tag)
    }
}

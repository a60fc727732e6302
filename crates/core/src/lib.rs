#![deny(missing_docs)]
//! mdrift core: streaming HTML tokenizer, Markdown engine, plugin regions,
//! and chunk splitter.

/// Attribute parsing for opening tags.
pub mod attributes;
/// Parallel conversion of many documents.
pub mod batch;
/// Core error types.
pub mod error;
/// Code fence tracking over Markdown lines.
pub mod fence;
/// Tag handlers producing Markdown fragments.
pub mod handlers;
/// Element and text nodes.
pub mod node;
/// Conversion and splitter options.
pub mod options;
/// Plugin hooks.
pub mod plugin;
/// Event sink writing Markdown into regions.
pub mod processor;
/// Deferred inclusion of output.
pub mod regions;
/// Chunk splitter.
pub mod splitter;
/// Incremental conversion.
pub mod stream;
/// Static tag table.
pub mod tags;
/// Streaming HTML tokenizer.
pub mod tokenizer;

pub use batch::{
    BatchInput, BatchOptions, BatchProcessingResult, BatchResult, BatchStats, PluginFactory,
    convert_batch,
};
pub use error::{ConfigError, MdriftError};
pub use node::{ElementNode, NodeId, TextNode};
pub use options::{ConvertOptions, LengthFunction, SplitterOptions};
pub use plugin::{HookContext, Plugin};
pub use processor::MarkdownProcessor;
pub use regions::{RegionId, RegionState};
pub use splitter::{ChunkMetadata, Chunks, LineRange, MarkdownChunk, html_to_markdown_split_chunks};
pub use stream::{MarkdownStream, stream_html_to_markdown, stream_reader_to_markdown};
pub use tags::TagId;
pub use tokenizer::{EventSink, ParseState};

/// Convert a complete HTML document to Markdown.
pub fn html_to_markdown(html: &str, options: ConvertOptions) -> String {
    let mut stream = MarkdownStream::new(options);
    let mut markdown = stream.push(html);
    markdown.push_str(&stream.finish());
    markdown
}

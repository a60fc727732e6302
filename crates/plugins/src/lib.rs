#![deny(missing_docs)]
//! Stock plugins for mdrift: selector-driven extraction and filtering,
//! frontmatter generation, and main-content isolation.

/// Element extraction by selector.
pub mod extraction;
/// Include/exclude filtering.
pub mod filter;
/// YAML frontmatter from the document head.
pub mod frontmatter;
/// Main-content isolation.
pub mod isolate_main;
/// CSS-like selector parsing and matching.
pub mod selector;

pub use extraction::{ExtractedElement, ExtractionPlugin};
pub use filter::{FilterOptions, FilterPlugin};
pub use frontmatter::{FrontmatterOptions, FrontmatterPlugin};
pub use isolate_main::IsolateMainPlugin;
pub use selector::{Selector, SelectorError};

//! YAML frontmatter generated from the document head.

use mdrift_core::{HookContext, Plugin, TagId, TextNode};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

fn default_meta_fields() -> Vec<String> {
    vec![
        "description".to_string(),
        "author".to_string(),
        "keywords".to_string(),
    ]
}

/// Frontmatter configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontmatterOptions {
    /// `<meta name>` values copied into the frontmatter, in this order.
    #[serde(default = "default_meta_fields")]
    pub meta_fields: Vec<String>,
    /// Also copy `og:*` properties.
    #[serde(default)]
    pub open_graph: bool,
    /// Fixed fields appended after the collected ones.
    #[serde(default)]
    pub additional_fields: BTreeMap<String, String>,
}

impl Default for FrontmatterOptions {
    fn default() -> Self {
        Self {
            meta_fields: default_meta_fields(),
            open_graph: false,
            additional_fields: BTreeMap::new(),
        }
    }
}

/// Writes a `---` delimited YAML block with the page title, selected meta
/// tags, and canonical URL at the top of the output.
///
/// The block is emitted when `</head>` is reached, or when `<body>` opens
/// in a document without a head.
#[derive(Debug, Default)]
pub struct FrontmatterPlugin {
    options: FrontmatterOptions,
    title: Option<String>,
    meta: BTreeMap<String, String>,
    open_graph: Vec<(String, String)>,
    canonical: Option<String>,
    saw_head: bool,
    emitted: bool,
}

impl FrontmatterPlugin {
    /// Plugin with the given options.
    pub fn new(options: FrontmatterOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    fn record_meta(&mut self, name: Option<&str>, property: Option<&str>, content: &str) {
        let content = content.trim();
        if content.is_empty() {
            return;
        }
        if let Some(name) = name.map(str::to_ascii_lowercase)
            && self.options.meta_fields.contains(&name)
        {
            self.meta.entry(name).or_insert_with(|| content.to_string());
        }
        if self.options.open_graph
            && let Some(property) = property.filter(|property| property.starts_with("og:"))
            && !self.open_graph.iter().any(|(key, _)| key == property)
        {
            self.open_graph
                .push((property.to_string(), content.to_string()));
        }
    }

    fn render(&mut self) -> Option<String> {
        if self.emitted {
            return None;
        }
        self.emitted = true;

        let mut fields = Mapping::new();
        let mut insert = |key: &str, value: &str| {
            fields.insert(Value::String(key.to_string()), Value::String(value.to_string()));
        };
        if let Some(title) = self.title.as_deref().filter(|title| !title.is_empty()) {
            insert("title", title);
        }
        for name in &self.options.meta_fields {
            if let Some(value) = self.meta.get(name) {
                insert(name, value);
            }
        }
        if let Some(canonical) = &self.canonical {
            insert("canonical", canonical);
        }
        for (key, value) in &self.open_graph {
            insert(key, value);
        }
        for (key, value) in &self.options.additional_fields {
            insert(key, value);
        }
        if fields.is_empty() {
            return None;
        }

        match serde_yaml::to_string(&Value::Mapping(fields)) {
            Ok(yaml) => Some(format!("---\n{yaml}---")),
            Err(error) => {
                log::warn!("failed to serialize frontmatter: {error}");
                None
            }
        }
    }
}

impl Plugin for FrontmatterPlugin {
    fn on_node_enter(&mut self, cx: &mut HookContext<'_>) -> Option<String> {
        let node = cx.node()?;
        match node.tag {
            TagId::Head => self.saw_head = true,
            TagId::Meta => {
                if let Some(content) = node.attribute("content") {
                    self.record_meta(node.attribute("name"), node.attribute("property"), content);
                }
            }
            TagId::Link => {
                let canonical = node.attribute("rel").is_some_and(|rel| {
                    rel.split_ascii_whitespace()
                        .any(|token| token.eq_ignore_ascii_case("canonical"))
                });
                if canonical && self.canonical.is_none() {
                    self.canonical = node.attribute("href").map(str::to_string);
                }
            }
            TagId::Body if !self.saw_head => return self.render(),
            _ => {}
        }
        None
    }

    fn process_text_node(&mut self, text: &TextNode, cx: &mut HookContext<'_>) -> Option<String> {
        if cx.node().is_some_and(|node| node.tag == TagId::Title)
            && cx.depth_of(TagId::Svg) == 0
        {
            let title = self.title.get_or_insert_with(String::new);
            if !title.is_empty() {
                title.push(' ');
            }
            title.push_str(&text.value.split_whitespace().collect::<Vec<_>>().join(" "));
        }
        None
    }

    fn on_node_exit(&mut self, cx: &mut HookContext<'_>) -> Option<String> {
        if cx.node().is_some_and(|node| node.tag == TagId::Head) {
            return self.render();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdrift_core::{ConvertOptions, html_to_markdown};

    fn convert(html: &str, options: FrontmatterOptions) -> String {
        html_to_markdown(
            html,
            ConvertOptions::new().with_plugin(FrontmatterPlugin::new(options)),
        )
    }

    #[test]
    fn emits_head_metadata() {
        let html = r#"<html><head>
            <title>  Release   notes </title>
            <meta name="Description" content="What changed">
            <meta name="viewport" content="width=device-width">
            <link rel="canonical" href="https://e.com/notes">
        </head><body><h1>Notes</h1></body></html>"#;
        insta::assert_snapshot!(convert(html, FrontmatterOptions::default()), @r"
        ---
        title: Release notes
        description: What changed
        canonical: https://e.com/notes
        ---

        # Notes
        ");
    }

    #[test]
    fn includes_open_graph_and_extra_fields() {
        let mut options = FrontmatterOptions {
            open_graph: true,
            ..FrontmatterOptions::default()
        };
        options
            .additional_fields
            .insert("source".to_string(), "crawler".to_string());
        let html = r#"<head><meta property="og:type" content="article"><title>T</title></head><p>x</p>"#;
        let markdown = convert(html, options);
        assert!(markdown.starts_with("---\ntitle: T\n"));
        assert!(markdown.contains("og:type"));
        assert!(markdown.contains("article"));
        assert!(markdown.contains("source: crawler\n---\n\nx"));
    }

    #[test]
    fn emits_at_body_without_head() {
        let mut options = FrontmatterOptions::default();
        options
            .additional_fields
            .insert("lang".to_string(), "en".to_string());
        assert_eq!(
            convert("<body><p>x</p></body>", options),
            "---\nlang: en\n---\n\nx"
        );
    }

    #[test]
    fn skips_empty_frontmatter() {
        assert_eq!(
            convert("<head></head><body><p>x</p></body>", FrontmatterOptions::default()),
            "x"
        );
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: FrontmatterOptions = serde_json::from_str(r#"{"openGraph": true}"#).unwrap();
        assert!(options.open_graph);
        assert_eq!(options.meta_fields, default_meta_fields());
    }
}

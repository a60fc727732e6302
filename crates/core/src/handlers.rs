//! Tag handlers.
//!
//! Each handler is a plain function looked up through the tag table. It
//! sees the element (with its depth snapshot), its parent and the shared
//! [`RenderState`], and returns the [`Fragment`] to write, if any.

use crate::node::ElementNode;
use crate::tags::TagId;
use std::borrow::Cow;
use url::Url;

/// Enter or exit producer stored in the tag table.
pub type Producer = fn(&mut HandlerContext<'_>) -> Option<Fragment>;

/// Markdown produced by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Opening marker, held back until content follows. Dropped together
    /// with the element's [`Fragment::Close`] when the element stays empty.
    Marker(Cow<'static, str>),
    /// Content that starts a block: pending newlines are written first,
    /// a pending space is discarded.
    Block(Cow<'static, str>),
    /// Inline content: pending newlines and a pending space come first.
    Inline(Cow<'static, str>),
    /// Written directly after whatever precedes it.
    Close(Cow<'static, str>),
}

/// Everything a producer may look at.
pub struct HandlerContext<'a> {
    /// The element entering or exiting.
    pub node: &'a ElementNode,
    /// Its parent, if any.
    pub parent: Option<&'a ElementNode>,
    /// Shared render state.
    pub render: &'a mut RenderState,
    /// Base for relative URLs.
    pub origin: Option<&'a Url>,
    /// The output currently ends with a newline (or is empty).
    pub at_line_start: bool,
}

/// Column alignment in a table separator row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// `:---`
    Left,
    /// `:---:`
    Center,
    /// `---:`
    Right,
}

impl Alignment {
    fn parse(node: &ElementNode) -> Option<Alignment> {
        let from_style = node.attribute("style").and_then(|style| {
            style.split(';').find_map(|declaration| {
                let (property, value) = declaration.split_once(':')?;
                (property.trim().eq_ignore_ascii_case("text-align")).then(|| value.trim())
            })
        });
        match node.attribute("align").or(from_style)?.to_ascii_lowercase().as_str() {
            "left" => Some(Alignment::Left),
            "center" => Some(Alignment::Center),
            "right" => Some(Alignment::Right),
            _ => None,
        }
    }

    fn separator(alignment: Option<Alignment>) -> &'static str {
        match alignment {
            None => "---",
            Some(Alignment::Left) => ":---",
            Some(Alignment::Center) => ":---:",
            Some(Alignment::Right) => "---:",
        }
    }
}

#[derive(Debug, Default)]
struct TableState {
    rows: usize,
    alignments: Vec<Option<Alignment>>,
}

#[derive(Debug)]
struct CodeFence {
    language: Option<String>,
    opened: bool,
}

/// Per-document state shared by handlers.
#[derive(Debug, Default)]
pub struct RenderState {
    tables: Vec<TableState>,
    fence: Option<CodeFence>,
    links: Vec<String>,
}

impl RenderState {
    /// Opening fence line, the first time content arrives inside `pre`.
    pub(crate) fn open_fence(&mut self) -> Option<String> {
        let fence = self.fence.as_mut().filter(|fence| !fence.opened)?;
        fence.opened = true;
        Some(format!("```{}\n", fence.language.as_deref().unwrap_or("")))
    }

    /// Record rendered text of the innermost open link.
    pub(crate) fn record_link_text(&mut self, text: &str) {
        if let Some(link) = self.links.last_mut() {
            link.push_str(text);
        }
    }
}

/// Resolve `raw` against `origin`.
///
/// Absolute URLs and fragment-only references are kept; relative and
/// protocol-relative references are joined onto the origin when one is set.
pub fn resolve_url(raw: &str, origin: Option<&Url>) -> String {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('#') || Url::parse(raw).is_ok() {
        return raw.to_string();
    }
    match origin {
        Some(base) => base
            .join(raw)
            .map(String::from)
            .unwrap_or_else(|_| raw.to_string()),
        None => raw.to_string(),
    }
}

fn destination(raw: &str, origin: Option<&Url>) -> String {
    let url = resolve_url(raw, origin);
    if url.contains(|c: char| c.is_whitespace() || c == '(' || c == ')') {
        format!("<{url}>")
    } else {
        url
    }
}

fn title_suffix(title: Option<&str>) -> String {
    match title.map(str::trim).filter(|title| !title.is_empty()) {
        Some(title) => format!(" \"{}\"", title.replace('"', "\\\"")),
        None => String::new(),
    }
}

fn code_language(node: &ElementNode) -> Option<String> {
    node.classes().find_map(|class| {
        class
            .strip_prefix("language-")
            .or_else(|| class.strip_prefix("lang-"))
            .filter(|language| !language.is_empty())
            .map(str::to_string)
    })
}

fn inside_cell(node: &ElementNode) -> bool {
    node.depth_of(TagId::Td) + node.depth_of(TagId::Th) > 0
}

fn nested_table(node: &ElementNode) -> bool {
    node.depth_of(TagId::Table) > 1
}

pub(crate) fn heading_enter(cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    let level = cx.node.tag.heading_level()?;
    if cx.node.depth_of(TagId::A) > 0 {
        return Some(Fragment::Marker(format!("<h{level}>").into()));
    }
    Some(Fragment::Marker(format!("{} ", "#".repeat(level as usize)).into()))
}

pub(crate) fn heading_exit(cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    let level = cx.node.tag.heading_level()?;
    (cx.node.depth_of(TagId::A) > 0).then(|| Fragment::Close(format!("</h{level}>").into()))
}

fn strong_depth(node: &ElementNode) -> u16 {
    node.depth_of(TagId::Strong) + node.depth_of(TagId::B) + node.depth_of(TagId::Dt)
}

pub(crate) fn strong_enter(cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    (strong_depth(cx.node) == 1).then_some(Fragment::Marker("**".into()))
}

pub(crate) fn strong_exit(cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    (strong_depth(cx.node) == 1).then_some(Fragment::Close("**".into()))
}

fn emphasis_depth(node: &ElementNode) -> u16 {
    node.depth_of(TagId::Em) + node.depth_of(TagId::I)
}

pub(crate) fn emphasis_enter(cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    (emphasis_depth(cx.node) == 1).then_some(Fragment::Marker("_".into()))
}

pub(crate) fn emphasis_exit(cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    (emphasis_depth(cx.node) == 1).then_some(Fragment::Close("_".into()))
}

fn strike_depth(node: &ElementNode) -> u16 {
    node.depth_of(TagId::Del) + node.depth_of(TagId::S) + node.depth_of(TagId::Strike)
}

pub(crate) fn strike_enter(cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    (strike_depth(cx.node) == 1).then_some(Fragment::Marker("~~".into()))
}

pub(crate) fn strike_exit(cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    (strike_depth(cx.node) == 1).then_some(Fragment::Close("~~".into()))
}

fn inline_code_depth(node: &ElementNode) -> u16 {
    node.depth_of(TagId::Code) + node.depth_of(TagId::Kbd) + node.depth_of(TagId::Samp)
}

pub(crate) fn code_enter(cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    if cx.node.depth_of(TagId::Pre) > 0 {
        if let Some(fence) = cx.render.fence.as_mut()
            && fence.language.is_none()
        {
            fence.language = code_language(cx.node);
        }
        return None;
    }
    (inline_code_depth(cx.node) == 1).then_some(Fragment::Marker("`".into()))
}

pub(crate) fn code_exit(cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    if cx.node.depth_of(TagId::Pre) > 0 {
        return None;
    }
    (inline_code_depth(cx.node) == 1).then_some(Fragment::Close("`".into()))
}

pub(crate) fn pre_enter(cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    if cx.node.depth_of(TagId::Pre) == 1 {
        cx.render.fence = Some(CodeFence {
            language: code_language(cx.node),
            opened: false,
        });
    }
    None
}

pub(crate) fn pre_exit(cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    if cx.node.depth_of(TagId::Pre) != 1 {
        return None;
    }
    let fence = cx.render.fence.take()?;
    if !fence.opened {
        return None;
    }
    Some(Fragment::Close(if cx.at_line_start {
        "```".into()
    } else {
        "\n```".into()
    }))
}

pub(crate) fn blockquote_enter(_cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    Some(Fragment::Marker("> ".into()))
}

pub(crate) fn list_item_enter(cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    match cx.parent.filter(|parent| parent.tag == TagId::Ol) {
        Some(list) => {
            let start = list
                .attribute("start")
                .and_then(|start| start.trim().parse::<i64>().ok())
                .unwrap_or(1);
            let number = start + cx.node.element_index as i64 - 1;
            Some(Fragment::Marker(format!("{number}. ").into()))
        }
        None => Some(Fragment::Marker("- ".into())),
    }
}

pub(crate) fn checkbox(cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    let is_checkbox = cx
        .node
        .attribute("type")
        .is_some_and(|kind| kind.eq_ignore_ascii_case("checkbox"));
    if !is_checkbox || cx.node.depth_of(TagId::Li) == 0 {
        return None;
    }
    let mark = if cx.node.attribute("checked").is_some() {
        "[x] "
    } else {
        "[ ] "
    };
    Some(Fragment::Inline(mark.into()))
}

pub(crate) fn definition_enter(_cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    Some(Fragment::Marker(": ".into()))
}

pub(crate) fn literal_tag_enter(cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    Some(Fragment::Marker(format!("<{}>", cx.node.name).into()))
}

pub(crate) fn literal_tag_exit(cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    Some(Fragment::Close(format!("</{}>", cx.node.name).into()))
}

pub(crate) fn quote_enter(_cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    Some(Fragment::Marker("\"".into()))
}

pub(crate) fn quote_exit(_cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    Some(Fragment::Close("\"".into()))
}

pub(crate) fn line_break(cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    inside_cell(cx.node).then_some(Fragment::Inline("<br>".into()))
}

pub(crate) fn thematic_break(_cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    Some(Fragment::Block("---".into()))
}

fn is_link(node: &ElementNode) -> bool {
    node.attribute("href").is_some() && node.depth_of(TagId::A) == 1
}

pub(crate) fn anchor_enter(cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    if !is_link(cx.node) {
        return None;
    }
    cx.render.links.push(String::new());
    Some(Fragment::Marker("[".into()))
}

pub(crate) fn anchor_exit(cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    if !is_link(cx.node) {
        return None;
    }
    let text = cx.render.links.pop().unwrap_or_default();
    let href = cx.node.attribute("href").unwrap_or_default();
    let title = cx
        .node
        .attribute("title")
        .filter(|title| title.trim() != text.trim());
    Some(Fragment::Close(
        format!(
            "]({}{})",
            destination(href, cx.origin),
            title_suffix(title)
        )
        .into(),
    ))
}

pub(crate) fn image(cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    let src = cx
        .node
        .attribute("src")
        .filter(|src| !src.trim().is_empty())
        .or_else(|| cx.node.attribute("data-src"))?;
    let alt = cx
        .node
        .attribute("alt")
        .unwrap_or_default()
        .trim()
        .replace('[', "\\[")
        .replace(']', "\\]");
    Some(Fragment::Inline(
        format!(
            "![{alt}]({}{})",
            destination(src, cx.origin),
            title_suffix(cx.node.attribute("title"))
        )
        .into(),
    ))
}

pub(crate) fn table_enter(cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    if nested_table(cx.node) {
        return Some(Fragment::Inline("<table>".into()));
    }
    cx.render.tables.push(TableState::default());
    None
}

pub(crate) fn table_exit(cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    if nested_table(cx.node) {
        return Some(Fragment::Close("</table>".into()));
    }
    cx.render.tables.pop();
    None
}

pub(crate) fn table_row_enter(cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    if nested_table(cx.node) {
        return Some(Fragment::Inline("<tr>".into()));
    }
    cx.render.tables.last()?;
    Some(Fragment::Block("|".into()))
}

pub(crate) fn table_row_exit(cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    if nested_table(cx.node) {
        return Some(Fragment::Close("</tr>".into()));
    }
    let table = cx.render.tables.last_mut()?;
    table.rows += 1;
    if table.rows != 1 {
        return None;
    }
    if table.alignments.is_empty() {
        table.alignments.push(None);
    }
    let cells: Vec<&str> = table
        .alignments
        .iter()
        .map(|alignment| Alignment::separator(*alignment))
        .collect();
    Some(Fragment::Close(format!("\n| {} |", cells.join(" | ")).into()))
}

pub(crate) fn table_cell_enter(cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    if nested_table(cx.node) {
        return Some(Fragment::Inline(format!("<{}>", cx.node.name).into()));
    }
    let table = cx.render.tables.last_mut()?;
    if table.rows == 0 {
        let column = cx.node.element_index.saturating_sub(1);
        if table.alignments.len() <= column {
            table.alignments.resize(column + 1, None);
        }
        if table.alignments[column].is_none() {
            table.alignments[column] = Alignment::parse(cx.node);
        }
    }
    Some(Fragment::Close(" ".into()))
}

pub(crate) fn table_cell_exit(cx: &mut HandlerContext<'_>) -> Option<Fragment> {
    if nested_table(cx.node) {
        return Some(Fragment::Close(format!("</{}>", cx.node.name).into()));
    }
    cx.render.tables.last()?;
    Some(Fragment::Close(" |".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("https://example.com/docs/page").unwrap()
    }

    #[test]
    fn resolves_relative_urls_against_origin() {
        let origin = origin();
        assert_eq!(
            resolve_url("/img.png", Some(&origin)),
            "https://example.com/img.png"
        );
        assert_eq!(
            resolve_url("other", Some(&origin)),
            "https://example.com/docs/other"
        );
        assert_eq!(
            resolve_url("//cdn.example.org/a.js", Some(&origin)),
            "https://cdn.example.org/a.js"
        );
    }

    #[test]
    fn keeps_absolute_and_fragment_urls() {
        let origin = origin();
        assert_eq!(
            resolve_url("https://other.org/x", Some(&origin)),
            "https://other.org/x"
        );
        assert_eq!(resolve_url("#top", Some(&origin)), "#top");
        assert_eq!(
            resolve_url("mailto:me@example.com", Some(&origin)),
            "mailto:me@example.com"
        );
        assert_eq!(resolve_url("/img.png", None), "/img.png");
    }

    #[test]
    fn wraps_destinations_with_spaces() {
        assert_eq!(destination("my file.pdf", None), "<my file.pdf>");
        assert_eq!(destination("a.pdf", None), "a.pdf");
    }

    #[test]
    fn escapes_quotes_in_titles() {
        assert_eq!(title_suffix(Some(r#"say "hi""#)), r#" "say \"hi\"""#);
        assert_eq!(title_suffix(Some("  ")), "");
        assert_eq!(title_suffix(None), "");
    }

    #[test]
    fn separator_cells_follow_alignment() {
        assert_eq!(Alignment::separator(None), "---");
        assert_eq!(Alignment::separator(Some(Alignment::Left)), ":---");
        assert_eq!(Alignment::separator(Some(Alignment::Center)), ":---:");
        assert_eq!(Alignment::separator(Some(Alignment::Right)), "---:");
    }
}

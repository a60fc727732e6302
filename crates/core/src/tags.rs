//! Static tag metadata table.
//!
//! Every tag the converter knows about has a dense [`TagId`] and a matching
//! [`TagSpec`] entry in [`TAGS`]. Lookups by id are array indexing; lookups
//! by name go through a lazily built map over the same table.

use crate::handlers::{self, Producer};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Closed vocabulary of tags recognized by the converter.
///
/// The discriminant doubles as the index into [`TAGS`] and into depth maps.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum TagId {
    Html,
    Head,
    Body,
    Title,
    Meta,
    Link,
    Base,
    Style,
    Script,
    Noscript,
    Template,
    Main,
    Header,
    Footer,
    Nav,
    Section,
    Article,
    Aside,
    Div,
    Center,
    Address,
    Hgroup,
    Search,
    Figure,
    Figcaption,
    Details,
    Summary,
    Dialog,
    P,
    Br,
    Wbr,
    Hr,
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
    Blockquote,
    Pre,
    Code,
    Kbd,
    Samp,
    Var,
    Ul,
    Ol,
    Li,
    Menu,
    Dl,
    Dt,
    Dd,
    Table,
    Caption,
    Colgroup,
    Col,
    Thead,
    Tbody,
    Tfoot,
    Tr,
    Th,
    Td,
    A,
    Img,
    Picture,
    Source,
    Video,
    Audio,
    Track,
    Iframe,
    Embed,
    Object,
    Param,
    Canvas,
    Svg,
    Math,
    Map,
    Area,
    Strong,
    B,
    Em,
    I,
    U,
    Del,
    S,
    Strike,
    Ins,
    Mark,
    Small,
    Big,
    Sub,
    Sup,
    Q,
    Cite,
    Abbr,
    Dfn,
    Time,
    Data,
    Span,
    Font,
    Bdi,
    Bdo,
    Ruby,
    Rt,
    Rp,
    Form,
    Fieldset,
    Legend,
    Label,
    Input,
    Button,
    Select,
    Option,
    Optgroup,
    Datalist,
    Textarea,
    Output,
    Progress,
    Meter,
    Xmp,
    Unknown,
}

/// Number of distinct tag ids, including [`TagId::Unknown`].
pub const TAG_COUNT: usize = TagId::Unknown as usize + 1;

/// Newlines requested before and after an element's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spacing {
    /// Newlines required before the element's first output.
    pub before: u8,
    /// Newlines required after the element's last output.
    pub after: u8,
}

impl Spacing {
    /// No separation.
    pub const NONE: Spacing = Spacing {
        before: 0,
        after: 0,
    };
    /// One blank line on either side.
    pub const BLOCK: Spacing = Spacing {
        before: 2,
        after: 2,
    };
    /// Own line, no blank line.
    pub const LINE: Spacing = Spacing {
        before: 1,
        after: 1,
    };
    /// Line break after only.
    pub const BREAK: Spacing = Spacing {
        before: 0,
        after: 1,
    };
}

/// Immutable behavior of one tag.
#[derive(Clone, Copy)]
pub struct TagSpec {
    /// Dense id, equal to this entry's index in [`TAGS`].
    pub id: TagId,
    /// Lowercase tag name.
    pub name: &'static str,
    /// Void element: never pushed as the current element.
    pub self_closing: bool,
    /// Raw text content: `<` only starts a tag when it closes this element.
    pub non_nesting: bool,
    /// Whitespace-only text directly inside is dropped.
    pub collapses_inner_whitespace: bool,
    /// Whitespace inside is kept verbatim.
    pub preserves_whitespace: bool,
    /// Neither the element nor its subtree produce Markdown.
    pub excluded: bool,
    /// Block separation rule.
    pub spacing: Spacing,
    /// Producer invoked on enter.
    pub enter: Option<Producer>,
    /// Producer invoked on exit.
    pub exit: Option<Producer>,
}

impl std::fmt::Debug for TagSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagSpec")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("spacing", &self.spacing)
            .finish_non_exhaustive()
    }
}

impl TagSpec {
    const fn new(id: TagId, name: &'static str) -> Self {
        Self {
            id,
            name,
            self_closing: false,
            non_nesting: false,
            collapses_inner_whitespace: false,
            preserves_whitespace: false,
            excluded: false,
            spacing: Spacing::NONE,
            enter: None,
            exit: None,
        }
    }

    const fn block(mut self) -> Self {
        self.spacing = Spacing::BLOCK;
        self
    }

    const fn line(mut self) -> Self {
        self.spacing = Spacing::LINE;
        self
    }

    const fn void(mut self) -> Self {
        self.self_closing = true;
        self
    }

    const fn raw_text(mut self) -> Self {
        self.non_nesting = true;
        self
    }

    const fn excluded(mut self) -> Self {
        self.excluded = true;
        self
    }

    const fn collapse(mut self) -> Self {
        self.collapses_inner_whitespace = true;
        self
    }

    const fn preserve(mut self) -> Self {
        self.preserves_whitespace = true;
        self
    }

    const fn spacing(mut self, spacing: Spacing) -> Self {
        self.spacing = spacing;
        self
    }

    const fn on(mut self, enter: Producer, exit: Producer) -> Self {
        self.enter = Some(enter);
        self.exit = Some(exit);
        self
    }

    const fn on_enter(mut self, enter: Producer) -> Self {
        self.enter = Some(enter);
        self
    }
}

use TagId as T;

/// Tag table indexed by [`TagId`].
pub static TAGS: [TagSpec; TAG_COUNT] = [
    TagSpec::new(T::Html, "html").collapse(),
    TagSpec::new(T::Head, "head").excluded().collapse(),
    TagSpec::new(T::Body, "body").collapse(),
    TagSpec::new(T::Title, "title").raw_text().excluded(),
    TagSpec::new(T::Meta, "meta").void().excluded(),
    TagSpec::new(T::Link, "link").void().excluded(),
    TagSpec::new(T::Base, "base").void().excluded(),
    TagSpec::new(T::Style, "style").raw_text().excluded(),
    TagSpec::new(T::Script, "script").raw_text().excluded(),
    TagSpec::new(T::Noscript, "noscript").raw_text().excluded(),
    TagSpec::new(T::Template, "template").excluded(),
    TagSpec::new(T::Main, "main").block(),
    TagSpec::new(T::Header, "header").block(),
    TagSpec::new(T::Footer, "footer").block(),
    TagSpec::new(T::Nav, "nav").block(),
    TagSpec::new(T::Section, "section").block(),
    TagSpec::new(T::Article, "article").block(),
    TagSpec::new(T::Aside, "aside").block(),
    TagSpec::new(T::Div, "div").block(),
    TagSpec::new(T::Center, "center").block(),
    TagSpec::new(T::Address, "address").block(),
    TagSpec::new(T::Hgroup, "hgroup").block(),
    TagSpec::new(T::Search, "search").block(),
    TagSpec::new(T::Figure, "figure").block(),
    TagSpec::new(T::Figcaption, "figcaption").block(),
    TagSpec::new(T::Details, "details").block(),
    TagSpec::new(T::Summary, "summary").block(),
    TagSpec::new(T::Dialog, "dialog").block(),
    TagSpec::new(T::P, "p").block(),
    TagSpec::new(T::Br, "br").void().spacing(Spacing::BREAK).on_enter(handlers::line_break),
    TagSpec::new(T::Wbr, "wbr").void(),
    TagSpec::new(T::Hr, "hr").void().block().on_enter(handlers::thematic_break),
    TagSpec::new(T::H1, "h1").block().on(handlers::heading_enter, handlers::heading_exit),
    TagSpec::new(T::H2, "h2").block().on(handlers::heading_enter, handlers::heading_exit),
    TagSpec::new(T::H3, "h3").block().on(handlers::heading_enter, handlers::heading_exit),
    TagSpec::new(T::H4, "h4").block().on(handlers::heading_enter, handlers::heading_exit),
    TagSpec::new(T::H5, "h5").block().on(handlers::heading_enter, handlers::heading_exit),
    TagSpec::new(T::H6, "h6").block().on(handlers::heading_enter, handlers::heading_exit),
    TagSpec::new(T::Blockquote, "blockquote").block().on_enter(handlers::blockquote_enter),
    TagSpec::new(T::Pre, "pre").block().preserve().on(handlers::pre_enter, handlers::pre_exit),
    TagSpec::new(T::Code, "code").on(handlers::code_enter, handlers::code_exit),
    TagSpec::new(T::Kbd, "kbd").on(handlers::code_enter, handlers::code_exit),
    TagSpec::new(T::Samp, "samp").on(handlers::code_enter, handlers::code_exit),
    TagSpec::new(T::Var, "var"),
    TagSpec::new(T::Ul, "ul").block().collapse(),
    TagSpec::new(T::Ol, "ol").block().collapse(),
    TagSpec::new(T::Li, "li").line().on_enter(handlers::list_item_enter),
    TagSpec::new(T::Menu, "menu").block().collapse(),
    TagSpec::new(T::Dl, "dl").block().collapse(),
    TagSpec::new(T::Dt, "dt").line().on(handlers::strong_enter, handlers::strong_exit),
    TagSpec::new(T::Dd, "dd").line().on_enter(handlers::definition_enter),
    TagSpec::new(T::Table, "table")
        .block()
        .collapse()
        .on(handlers::table_enter, handlers::table_exit),
    TagSpec::new(T::Caption, "caption").block(),
    TagSpec::new(T::Colgroup, "colgroup").excluded().collapse(),
    TagSpec::new(T::Col, "col").void().excluded(),
    TagSpec::new(T::Thead, "thead").collapse(),
    TagSpec::new(T::Tbody, "tbody").collapse(),
    TagSpec::new(T::Tfoot, "tfoot").collapse(),
    TagSpec::new(T::Tr, "tr")
        .line()
        .collapse()
        .on(handlers::table_row_enter, handlers::table_row_exit),
    TagSpec::new(T::Th, "th").on(handlers::table_cell_enter, handlers::table_cell_exit),
    TagSpec::new(T::Td, "td").on(handlers::table_cell_enter, handlers::table_cell_exit),
    TagSpec::new(T::A, "a").on(handlers::anchor_enter, handlers::anchor_exit),
    TagSpec::new(T::Img, "img").void().on_enter(handlers::image),
    TagSpec::new(T::Picture, "picture").collapse(),
    TagSpec::new(T::Source, "source").void().excluded(),
    TagSpec::new(T::Video, "video").excluded(),
    TagSpec::new(T::Audio, "audio").excluded(),
    TagSpec::new(T::Track, "track").void().excluded(),
    TagSpec::new(T::Iframe, "iframe").excluded(),
    TagSpec::new(T::Embed, "embed").void().excluded(),
    TagSpec::new(T::Object, "object").excluded(),
    TagSpec::new(T::Param, "param").void().excluded(),
    TagSpec::new(T::Canvas, "canvas").excluded(),
    TagSpec::new(T::Svg, "svg").excluded(),
    TagSpec::new(T::Math, "math").excluded(),
    TagSpec::new(T::Map, "map").excluded(),
    TagSpec::new(T::Area, "area").void().excluded(),
    TagSpec::new(T::Strong, "strong").on(handlers::strong_enter, handlers::strong_exit),
    TagSpec::new(T::B, "b").on(handlers::strong_enter, handlers::strong_exit),
    TagSpec::new(T::Em, "em").on(handlers::emphasis_enter, handlers::emphasis_exit),
    TagSpec::new(T::I, "i").on(handlers::emphasis_enter, handlers::emphasis_exit),
    TagSpec::new(T::U, "u"),
    TagSpec::new(T::Del, "del").on(handlers::strike_enter, handlers::strike_exit),
    TagSpec::new(T::S, "s").on(handlers::strike_enter, handlers::strike_exit),
    TagSpec::new(T::Strike, "strike").on(handlers::strike_enter, handlers::strike_exit),
    TagSpec::new(T::Ins, "ins"),
    TagSpec::new(T::Mark, "mark"),
    TagSpec::new(T::Small, "small"),
    TagSpec::new(T::Big, "big"),
    TagSpec::new(T::Sub, "sub").on(handlers::literal_tag_enter, handlers::literal_tag_exit),
    TagSpec::new(T::Sup, "sup").on(handlers::literal_tag_enter, handlers::literal_tag_exit),
    TagSpec::new(T::Q, "q").on(handlers::quote_enter, handlers::quote_exit),
    TagSpec::new(T::Cite, "cite"),
    TagSpec::new(T::Abbr, "abbr"),
    TagSpec::new(T::Dfn, "dfn"),
    TagSpec::new(T::Time, "time"),
    TagSpec::new(T::Data, "data"),
    TagSpec::new(T::Span, "span"),
    TagSpec::new(T::Font, "font"),
    TagSpec::new(T::Bdi, "bdi"),
    TagSpec::new(T::Bdo, "bdo"),
    TagSpec::new(T::Ruby, "ruby"),
    TagSpec::new(T::Rt, "rt"),
    TagSpec::new(T::Rp, "rp").excluded(),
    TagSpec::new(T::Form, "form").block(),
    TagSpec::new(T::Fieldset, "fieldset").block(),
    TagSpec::new(T::Legend, "legend").line(),
    TagSpec::new(T::Label, "label"),
    TagSpec::new(T::Input, "input").void().on_enter(handlers::checkbox),
    TagSpec::new(T::Button, "button").excluded(),
    TagSpec::new(T::Select, "select").excluded().collapse(),
    TagSpec::new(T::Option, "option").excluded(),
    TagSpec::new(T::Optgroup, "optgroup").excluded(),
    TagSpec::new(T::Datalist, "datalist").excluded(),
    TagSpec::new(T::Textarea, "textarea").raw_text().preserve().excluded(),
    TagSpec::new(T::Output, "output"),
    TagSpec::new(T::Progress, "progress").excluded(),
    TagSpec::new(T::Meter, "meter").excluded(),
    TagSpec::new(T::Xmp, "xmp").raw_text().preserve().block(),
    TagSpec::new(T::Unknown, ""),
];

static BY_NAME: Lazy<HashMap<&'static str, TagId>> = Lazy::new(|| {
    TAGS.iter()
        .filter(|spec| spec.id != TagId::Unknown)
        .map(|spec| (spec.name, spec.id))
        .chain([("listing", TagId::Pre), ("plaintext", TagId::Pre)])
        .collect()
});

impl TagId {
    /// Looks up a tag by its lowercase name; unrecognized names map to [`TagId::Unknown`].
    pub fn from_name(name: &str) -> TagId {
        BY_NAME.get(name).copied().unwrap_or(TagId::Unknown)
    }

    /// Metadata for this tag.
    pub fn spec(self) -> &'static TagSpec {
        &TAGS[self as usize]
    }

    /// Index into depth maps and [`TAGS`].
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Heading level (1-6) for `h1`..`h6`.
    pub const fn heading_level(self) -> Option<u8> {
        match self {
            TagId::H1 => Some(1),
            TagId::H2 => Some(2),
            TagId::H3 => Some(3),
            TagId::H4 => Some(4),
            TagId::H5 => Some(5),
            TagId::H6 => Some(6),
            _ => None,
        }
    }

    /// Heading tag for a level (1-6).
    pub const fn heading(level: u8) -> Option<TagId> {
        match level {
            1 => Some(TagId::H1),
            2 => Some(TagId::H2),
            3 => Some(TagId::H3),
            4 => Some(TagId::H4),
            5 => Some(TagId::H5),
            6 => Some(TagId::H6),
            _ => None,
        }
    }
}

//! CSS-like selectors matched against single elements.
//!
//! Supported: type (`div`, `*`), `#id`, `.class`, `[attr]` and
//! `[attr<op>value]` with `=`, `^=`, `$=`, `*=`, `~=`, `|=`, compounds of
//! those, and comma-separated lists. Combinators are rejected.

use mdrift_core::ElementNode;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced while parsing a selector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    /// The selector (or one of its comma-separated parts) is empty.
    #[error("empty selector")]
    Empty,
    /// A character that cannot start or continue a selector.
    #[error("unexpected {found:?} at offset {position}")]
    Unexpected {
        /// Offending character.
        found: char,
        /// Byte offset in the selector.
        position: usize,
    },
    /// `#`, `.` or `[` without a name.
    #[error("missing name at offset {position}")]
    MissingName {
        /// Byte offset in the selector.
        position: usize,
    },
    /// `[` without a matching `]`, or an unclosed quote.
    #[error("unterminated attribute selector starting at offset {position}")]
    UnterminatedAttribute {
        /// Byte offset of the `[`.
        position: usize,
    },
    /// Descendant, child or sibling combinators.
    #[error("combinators are not supported (offset {position})")]
    Combinator {
        /// Byte offset of the combinator.
        position: usize,
    },
}

/// Attribute comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeOperator {
    /// `[attr]`
    Exists,
    /// `[attr=value]`
    Equals,
    /// `[attr^=value]`
    Prefix,
    /// `[attr$=value]`
    Suffix,
    /// `[attr*=value]`
    Contains,
    /// `[attr~=value]`: whitespace-separated word.
    Word,
    /// `[attr|=value]`: exact or followed by `-`.
    DashMatch,
}

/// One attribute condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSelector {
    /// Lowercase attribute name.
    pub name: String,
    /// Comparison.
    pub operator: AttributeOperator,
    /// Comparison operand; empty for [`AttributeOperator::Exists`].
    pub value: String,
}

impl AttributeSelector {
    fn matches(&self, node: &ElementNode) -> bool {
        let Some(actual) = node.attribute(&self.name) else {
            return false;
        };
        let value = self.value.as_str();
        match self.operator {
            AttributeOperator::Exists => true,
            AttributeOperator::Equals => actual == value,
            AttributeOperator::Prefix => !value.is_empty() && actual.starts_with(value),
            AttributeOperator::Suffix => !value.is_empty() && actual.ends_with(value),
            AttributeOperator::Contains => !value.is_empty() && actual.contains(value),
            AttributeOperator::Word => actual.split_ascii_whitespace().any(|word| word == value),
            AttributeOperator::DashMatch => {
                actual == value
                    || actual
                        .strip_prefix(value)
                        .is_some_and(|rest| rest.starts_with('-'))
            }
        }
    }
}

/// Conditions that must all hold for one element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompoundSelector {
    /// Lowercase tag name; `None` matches any tag.
    pub tag: Option<String>,
    /// Required `id`.
    pub id: Option<String>,
    /// Required classes.
    pub classes: Vec<String>,
    /// Attribute conditions.
    pub attributes: Vec<AttributeSelector>,
}

impl CompoundSelector {
    /// Whether `node` satisfies every condition.
    pub fn matches(&self, node: &ElementNode) -> bool {
        if let Some(tag) = &self.tag
            && *tag != node.name
        {
            return false;
        }
        if let Some(id) = &self.id
            && node.attribute("id") != Some(id.as_str())
        {
            return false;
        }
        if !self
            .classes
            .iter()
            .all(|class| node.classes().any(|candidate| candidate == class))
        {
            return false;
        }
        self.attributes
            .iter()
            .all(|attribute| attribute.matches(node))
    }
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    alternatives: Vec<CompoundSelector>,
}

impl Selector {
    /// Parse a selector list.
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let alternatives = Parser::new(source).parse_list()?;
        Ok(Self {
            source: source.trim().to_string(),
            alternatives,
        })
    }

    /// Whether any alternative matches `node`.
    pub fn matches(&self, node: &ElementNode) -> bool {
        self.alternatives
            .iter()
            .any(|compound| compound.matches(node))
    }

    /// The selector as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The comma-separated alternatives.
    pub fn alternatives(&self) -> &[CompoundSelector] {
        &self.alternatives
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        Self::parse(source)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Parse several selectors, failing on the first invalid one.
pub fn parse_all<S: AsRef<str>>(sources: &[S]) -> Result<Vec<Selector>, SelectorError> {
    sources
        .iter()
        .map(|source| Selector::parse(source.as_ref()))
        .collect()
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | ':')
}

struct Parser<'a> {
    source: &'a str,
    position: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            position: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.position..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.position += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn name(&mut self) -> Result<String, SelectorError> {
        let start = self.position;
        while self.peek().is_some_and(is_name_char) {
            self.bump();
        }
        if start == self.position {
            return Err(SelectorError::MissingName { position: start });
        }
        Ok(self.source[start..self.position].to_string())
    }

    fn parse_list(&mut self) -> Result<Vec<CompoundSelector>, SelectorError> {
        let mut alternatives = Vec::new();
        loop {
            self.skip_whitespace();
            alternatives.push(self.parse_compound()?);
            self.skip_whitespace();
            match self.bump() {
                None => return Ok(alternatives),
                Some(',') => continue,
                Some(found) => {
                    let position = self.position - found.len_utf8();
                    return Err(if matches!(found, '>' | '+' | '~') || is_name_char(found) {
                        SelectorError::Combinator { position }
                    } else {
                        SelectorError::Unexpected { found, position }
                    });
                }
            }
        }
    }

    fn parse_compound(&mut self) -> Result<CompoundSelector, SelectorError> {
        let mut compound = CompoundSelector::default();
        let start = self.position;
        match self.peek() {
            Some('*') => {
                self.bump();
            }
            Some(c) if is_name_char(c) => compound.tag = Some(self.name()?.to_ascii_lowercase()),
            _ => {}
        }
        while let Some(c) = self.peek() {
            match c {
                '#' => {
                    self.bump();
                    compound.id = Some(self.name()?);
                }
                '.' => {
                    self.bump();
                    compound.classes.push(self.name()?);
                }
                '[' => compound.attributes.push(self.attribute()?),
                _ => break,
            }
        }
        if self.position == start {
            return match self.peek() {
                None | Some(',') => Err(SelectorError::Empty),
                Some(found) => Err(SelectorError::Unexpected {
                    found,
                    position: self.position,
                }),
            };
        }
        Ok(compound)
    }

    fn attribute(&mut self) -> Result<AttributeSelector, SelectorError> {
        let open = self.position;
        let unterminated = SelectorError::UnterminatedAttribute { position: open };
        self.bump();
        self.skip_whitespace();
        let name = self.name()?.to_ascii_lowercase();
        self.skip_whitespace();

        let operator = match self.bump().ok_or(unterminated.clone())? {
            ']' => {
                return Ok(AttributeSelector {
                    name,
                    operator: AttributeOperator::Exists,
                    value: String::new(),
                });
            }
            '=' => AttributeOperator::Equals,
            c @ ('^' | '$' | '*' | '~' | '|') => {
                if self.bump() != Some('=') {
                    return Err(SelectorError::Unexpected {
                        found: c,
                        position: self.position - 1,
                    });
                }
                match c {
                    '^' => AttributeOperator::Prefix,
                    '$' => AttributeOperator::Suffix,
                    '*' => AttributeOperator::Contains,
                    '~' => AttributeOperator::Word,
                    _ => AttributeOperator::DashMatch,
                }
            }
            found => {
                return Err(SelectorError::Unexpected {
                    found,
                    position: self.position - found.len_utf8(),
                });
            }
        };

        self.skip_whitespace();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                let start = self.position;
                let length = self.source[start..].find(quote).ok_or(unterminated.clone())?;
                self.position += length + 1;
                self.source[start..start + length].to_string()
            }
            _ => {
                let start = self.position;
                while self
                    .peek()
                    .is_some_and(|c| c != ']' && !c.is_whitespace())
                {
                    self.bump();
                }
                self.source[start..self.position].to_string()
            }
        };
        self.skip_whitespace();
        if self.bump() != Some(']') {
            return Err(unterminated);
        }
        Ok(AttributeSelector {
            name,
            operator,
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdrift_core::TagId;
    use mdrift_core::attributes::Attributes;

    fn element(name: &str, attributes: &[(&str, &str)]) -> ElementNode {
        ElementNode {
            tag: TagId::from_name(name),
            name: name.to_string(),
            attributes: attributes
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect::<Attributes>(),
            parent: None,
            depth_map: [0; mdrift_core::tags::TAG_COUNT],
            depth: 1,
            element_index: 1,
            child_elements: 0,
            child_nodes: 0,
            region: 0,
            excluded: false,
            has_content: false,
        }
    }

    #[test]
    fn parses_compounds_and_lists() {
        let selector = Selector::parse("div.note#intro[data-kind='tip'], nav").unwrap();
        let [first, second] = selector.alternatives() else {
            panic!("expected two alternatives");
        };
        assert_eq!(first.tag.as_deref(), Some("div"));
        assert_eq!(first.id.as_deref(), Some("intro"));
        assert_eq!(first.classes, vec!["note"]);
        assert_eq!(
            first.attributes,
            vec![AttributeSelector {
                name: "data-kind".into(),
                operator: AttributeOperator::Equals,
                value: "tip".into(),
            }]
        );
        assert_eq!(second.tag.as_deref(), Some("nav"));
        assert_eq!(selector.to_string(), "div.note#intro[data-kind='tip'], nav");
    }

    #[test]
    fn matches_attribute_operators() {
        let link = element(
            "a",
            &[
                ("href", "https://example.com/docs"),
                ("rel", "noopener external"),
                ("lang", "en-US"),
            ],
        );
        for source in [
            "a[href]",
            "[href^=https]",
            "[href$='/docs']",
            "[href*=example]",
            "[rel~=external]",
            "[lang|=en]",
            "*[lang=\"en-US\"]",
            "A",
        ] {
            assert!(Selector::parse(source).unwrap().matches(&link), "{source}");
        }
        for source in ["[title]", "[href^=http:]", "[rel~=noop]", "[lang|=e]", "p"] {
            assert!(!Selector::parse(source).unwrap().matches(&link), "{source}");
        }
    }

    #[test]
    fn matches_classes_and_ids() {
        let node = element("section", &[("class", "post  featured"), ("id", "main")]);
        assert!(Selector::parse(".post.featured").unwrap().matches(&node));
        assert!(Selector::parse("#main").unwrap().matches(&node));
        assert!(!Selector::parse(".post.draft").unwrap().matches(&node));
        assert!(Selector::parse("aside, .featured").unwrap().matches(&node));
    }

    #[test]
    fn rejects_invalid_selectors() {
        assert_eq!(Selector::parse(""), Err(SelectorError::Empty));
        assert_eq!(Selector::parse("a,"), Err(SelectorError::Empty));
        assert_eq!(
            Selector::parse("div p"),
            Err(SelectorError::Combinator { position: 4 })
        );
        assert_eq!(
            Selector::parse("ul > li"),
            Err(SelectorError::Combinator { position: 3 })
        );
        assert_eq!(
            Selector::parse("a[href"),
            Err(SelectorError::UnterminatedAttribute { position: 1 })
        );
        assert_eq!(
            Selector::parse("a[title='x]"),
            Err(SelectorError::UnterminatedAttribute { position: 1 })
        );
        assert_eq!(
            Selector::parse("."),
            Err(SelectorError::MissingName { position: 1 })
        );
        assert_eq!(
            Selector::parse("a!"),
            Err(SelectorError::Unexpected {
                found: '!',
                position: 1
            })
        );
    }

    #[test]
    fn parses_lists_of_sources() {
        assert_eq!(parse_all(&["nav", "footer"]).unwrap().len(), 2);
        assert!(parse_all(&["nav", "]"]).is_err());
    }
}

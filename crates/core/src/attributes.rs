//! Attribute run parser.
//!
//! Parses everything between a tag name and the closing `>` of an opening
//! tag. The parser is resumable in the sense that it never guesses: when
//! the run does not reach `>` within the given input it reports
//! [`AttributeScan::Unterminated`] and the caller retries once more input
//! has arrived.

use std::collections::BTreeMap;

/// Attribute map of an element. Names are lowercase, values entity-decoded.
pub type Attributes = BTreeMap<String, String>;

/// Result of scanning an attribute run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeScan {
    /// The run ended with `>`.
    Complete {
        /// Parsed attributes.
        attributes: Attributes,
        /// Bytes consumed, including the closing `>`.
        consumed: usize,
        /// The tag was written as `<name ... />`.
        self_closing: bool,
    },
    /// The input ended before the closing `>`.
    Unterminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    BeforeName,
    Name,
    AfterName,
    BeforeValue,
    Quoted(char),
    Unquoted,
}

struct Builder {
    attributes: Attributes,
    name: String,
    value: String,
}

impl Builder {
    fn commit(&mut self) {
        if self.name.is_empty() {
            self.value.clear();
            return;
        }
        let name = std::mem::take(&mut self.name);
        let raw = std::mem::take(&mut self.value);
        // First occurrence wins, as in browsers.
        self.attributes
            .entry(name)
            .or_insert_with(|| html_escape::decode_html_entities(&raw).into_owned());
    }

    fn finish(mut self, consumed: usize, self_closing: bool) -> AttributeScan {
        self.commit();
        AttributeScan::Complete {
            attributes: self.attributes,
            consumed,
            self_closing,
        }
    }
}

/// Parse an attribute run starting right after the tag name.
pub fn parse_attributes(input: &str) -> AttributeScan {
    let mut builder = Builder {
        attributes: Attributes::new(),
        name: String::new(),
        value: String::new(),
    };
    let mut state = State::BeforeName;
    let mut slash = false;
    let mut escaped = false;

    for (i, c) in input.char_indices() {
        match state {
            State::BeforeName => match c {
                '>' => return builder.finish(i + 1, slash),
                '/' => slash = true,
                c if c.is_whitespace() => {}
                c => {
                    slash = false;
                    builder.name.extend(c.to_lowercase());
                    state = State::Name;
                }
            },
            State::Name => match c {
                '=' => state = State::BeforeValue,
                '>' => return builder.finish(i + 1, false),
                '/' => {
                    builder.commit();
                    slash = true;
                    state = State::BeforeName;
                }
                c if c.is_whitespace() => state = State::AfterName,
                c => builder.name.extend(c.to_lowercase()),
            },
            State::AfterName => match c {
                '=' => state = State::BeforeValue,
                '>' => return builder.finish(i + 1, false),
                '/' => {
                    builder.commit();
                    slash = true;
                    state = State::BeforeName;
                }
                c if c.is_whitespace() => {}
                c => {
                    builder.commit();
                    builder.name.extend(c.to_lowercase());
                    state = State::Name;
                }
            },
            State::BeforeValue => match c {
                '"' | '\'' => state = State::Quoted(c),
                '>' => return builder.finish(i + 1, false),
                c if c.is_whitespace() => {}
                c => {
                    builder.value.push(c);
                    state = State::Unquoted;
                }
            },
            State::Quoted(quote) => {
                if escaped {
                    if c != quote {
                        builder.value.push('\\');
                    }
                    builder.value.push(c);
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == quote {
                    builder.commit();
                    state = State::BeforeName;
                } else {
                    builder.value.push(c);
                }
            }
            State::Unquoted => match c {
                '>' => return builder.finish(i + 1, false),
                c if c.is_whitespace() => {
                    builder.commit();
                    state = State::BeforeName;
                }
                c => builder.value.push(c),
            },
        }
    }

    AttributeScan::Unterminated
}

/// Whitespace-separated class list of an attribute map.
pub fn classes(attributes: &Attributes) -> impl Iterator<Item = &str> {
    attributes
        .get("class")
        .map(|value| value.split_whitespace())
        .into_iter()
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(input: &str) -> (Attributes, usize, bool) {
        match parse_attributes(input) {
            AttributeScan::Complete {
                attributes,
                consumed,
                self_closing,
            } => (attributes, consumed, self_closing),
            AttributeScan::Unterminated => panic!("unterminated: {input:?}"),
        }
    }

    #[test]
    fn parses_value_forms() {
        let (attrs, consumed, self_closing) =
            complete(r#" href="/a" data-x='y z' width=10 hidden>rest"#);
        assert_eq!(attrs.get("href").map(String::as_str), Some("/a"));
        assert_eq!(attrs.get("data-x").map(String::as_str), Some("y z"));
        assert_eq!(attrs.get("width").map(String::as_str), Some("10"));
        assert_eq!(attrs.get("hidden").map(String::as_str), Some(""));
        assert_eq!(consumed, r#" href="/a" data-x='y z' width=10 hidden>"#.len());
        assert!(!self_closing);
    }

    #[test]
    fn lowercases_names_and_decodes_values() {
        let (attrs, _, _) = complete(r#" ALT="Tom &amp; Jerry" Title='&lt;b&gt;'>"#);
        assert_eq!(attrs.get("alt").map(String::as_str), Some("Tom & Jerry"));
        assert_eq!(attrs.get("title").map(String::as_str), Some("<b>"));
    }

    #[test]
    fn quoted_values_keep_gt_and_escaped_quotes() {
        let (attrs, _, _) = complete(r#" title="a > b \"c\"" alt='it\'s'>"#);
        assert_eq!(attrs.get("title").map(String::as_str), Some(r#"a > b "c""#));
        assert_eq!(attrs.get("alt").map(String::as_str), Some("it's"));
    }

    #[test]
    fn keeps_unrelated_backslashes() {
        let (attrs, _, _) = complete(r#" data-path="C:\dir">"#);
        assert_eq!(attrs.get("data-path").map(String::as_str), Some(r"C:\dir"));
    }

    #[test]
    fn detects_self_closing_syntax() {
        let (_, _, self_closing) = complete(" />");
        assert!(self_closing);
        let (attrs, _, self_closing) = complete(r#" src="x.png"/>"#);
        assert!(self_closing);
        assert_eq!(attrs.len(), 1);
        let (attrs, _, self_closing) = complete(" href=a/b/>");
        assert!(!self_closing);
        assert_eq!(attrs.get("href").map(String::as_str), Some("a/b/"));
    }

    #[test]
    fn first_duplicate_wins() {
        let (attrs, _, _) = complete(r#" id="one" id="two">"#);
        assert_eq!(attrs.get("id").map(String::as_str), Some("one"));
    }

    #[test]
    fn reports_unterminated_runs() {
        assert_eq!(parse_attributes(r#" href="/a"#), AttributeScan::Unterminated);
        assert_eq!(parse_attributes(" class=x"), AttributeScan::Unterminated);
        assert_eq!(parse_attributes(""), AttributeScan::Unterminated);
    }

    #[test]
    fn splits_class_list() {
        let (attrs, _, _) = complete(r#" class="  language-rust  highlight ">"#);
        let classes: Vec<&str> = classes(&attrs).collect();
        assert_eq!(classes, vec!["language-rust", "highlight"]);
    }
}

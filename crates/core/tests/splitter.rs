use mdrift_core::{
    ConfigError, ConvertOptions, LengthFunction, MarkdownChunk, SplitterOptions, TagId,
    html_to_markdown, html_to_markdown_split_chunks,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn split(html: &str, options: SplitterOptions) -> Vec<MarkdownChunk> {
    html_to_markdown_split_chunks(html, options).unwrap().collect()
}

fn contents(chunks: &[MarkdownChunk]) -> Vec<&str> {
    chunks.iter().map(|chunk| chunk.content.as_str()).collect()
}

fn fence_lines(text: &str) -> usize {
    text.lines()
        .filter(|line| line.trim_start().starts_with("```"))
        .count()
}

fn headers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

const LONG_PARAGRAPH: &str = "<p>alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu \
    nu xi omicron pi rho sigma tau upsilon phi chi psi omega</p>";

#[test]
fn overlap_must_be_smaller_than_size() {
    let options = SplitterOptions {
        chunk_size: 100,
        chunk_overlap: 100,
        ..SplitterOptions::default()
    };
    let error = html_to_markdown_split_chunks("<p>x</p>", options).err();
    assert_eq!(
        error,
        Some(ConfigError::OverlapTooLarge {
            overlap: 100,
            size: 100
        })
    );
}

#[test]
fn splits_on_second_section_heading() {
    let html = "<h1>Guide</h1><h2>Install</h2><p>Run the installer.</p>\
        <h2>Usage</h2><p>Call the API.</p>";
    let chunks = split(
        html,
        SplitterOptions {
            headers_to_split_on: vec![TagId::H2],
            ..SplitterOptions::default()
        },
    );
    assert_eq!(contents(&chunks), vec!["Run the installer.", "Call the API."]);
    assert_eq!(
        chunks[0].metadata.headers,
        headers(&[("h1", "Guide"), ("h2", "Install")])
    );
    assert_eq!(
        chunks[1].metadata.headers,
        headers(&[("h1", "Guide"), ("h2", "Usage")])
    );
}

#[test]
fn skips_headings_between_split_levels() {
    let chunks = split(
        "<h1>A</h1><h2>B</h2><h3>C</h3><p>x</p>",
        SplitterOptions {
            headers_to_split_on: vec![TagId::H1, TagId::H3],
            ..SplitterOptions::default()
        },
    );
    assert_eq!(contents(&chunks), vec!["x"]);
    assert_eq!(chunks[0].metadata.headers, headers(&[("h1", "A"), ("h3", "C")]));
}

#[test]
fn heading_metadata_is_plain_text() {
    let chunks = split(
        "<h2><a href=\"/notes\">[1]</a> Intro</h2><p>text</p>",
        SplitterOptions::default(),
    );
    assert_eq!(chunks[0].metadata.headers, headers(&[("h2", "[1] Intro")]));
}

#[test]
fn new_heading_clears_deeper_levels() {
    let html = "<h2>A</h2><h3>A.1</h3><p>one</p><h2>B</h2><p>two</p>";
    let chunks = split(html, SplitterOptions::default());
    let last = chunks.last().unwrap();
    assert_eq!(last.content, "two");
    assert_eq!(last.metadata.headers, headers(&[("h2", "B")]));
}

#[test]
fn keeps_headings_when_not_stripping() {
    let chunks = split(
        "<h2>A</h2><p>one</p><h2>B</h2><p>two</p>",
        SplitterOptions {
            strip_headers: false,
            ..SplitterOptions::default()
        },
    );
    assert_eq!(contents(&chunks), vec!["## A\n\none", "## B\n\ntwo"]);
}

#[test]
fn never_breaks_inside_a_word() {
    let chunks = split(
        LONG_PARAGRAPH,
        SplitterOptions {
            chunk_size: 20,
            chunk_overlap: 0,
            ..SplitterOptions::default()
        },
    );
    assert!(chunks.len() > 1);
    let words: Vec<&str> = LONG_PARAGRAPH
        .trim_start_matches("<p>")
        .trim_end_matches("</p>")
        .split_whitespace()
        .collect();
    for chunk in &chunks {
        assert!(chunk.content.chars().count() <= 20, "{:?}", chunk.content);
        for word in chunk.content.split_whitespace() {
            assert!(words.contains(&word), "broken word {word:?}");
        }
    }
    let rejoined: Vec<&str> = chunks
        .iter()
        .flat_map(|chunk| chunk.content.split_whitespace())
        .collect();
    assert_eq!(rejoined, words);
}

#[test]
fn zero_overlap_reconstructs_the_document() {
    let html = "<h1>Title</h1><p>First paragraph with several words in it.</p>\
        <ul><li>item one</li><li>item two</li></ul><p>Closing words here.</p>";
    let chunks = split(
        html,
        SplitterOptions {
            chunk_size: 24,
            chunk_overlap: 0,
            strip_headers: false,
            ..SplitterOptions::default()
        },
    );
    let full = html_to_markdown(html, ConvertOptions::default());
    let squash = |text: &str| text.split_whitespace().collect::<String>();
    let joined: String = chunks.iter().map(|chunk| squash(&chunk.content)).collect();
    assert_eq!(joined, squash(&full));
}

#[test]
fn maximal_overlap_terminates() {
    let chunks = split(
        LONG_PARAGRAPH,
        SplitterOptions {
            chunk_size: 10,
            chunk_overlap: 9,
            ..SplitterOptions::default()
        },
    );
    assert!(!chunks.is_empty());
    assert!(chunks.iter().all(|chunk| chunk.content.chars().count() <= 10));
    assert!(chunks.last().unwrap().content.ends_with("omega"));
}

#[test]
fn overlap_repeats_trailing_words() {
    let chunks = split(
        LONG_PARAGRAPH,
        SplitterOptions {
            chunk_size: 30,
            chunk_overlap: 10,
            ..SplitterOptions::default()
        },
    );
    assert!(chunks.len() > 2);
    for pair in chunks.windows(2) {
        let last_word = pair[0].content.split_whitespace().last().unwrap();
        assert!(
            pair[1]
                .content
                .split_whitespace()
                .take(3)
                .any(|word| word == last_word),
            "{:?} then {:?}",
            pair[0].content,
            pair[1].content
        );
    }
}

#[test]
fn code_blocks_are_never_split_open() {
    let code: String = (0..12).map(|line| format!("let value_{line} = {line};\n")).collect();
    let html = format!(
        "<h2>Code</h2><p>Some intro text before the code block.</p>\
         <pre><code class=\"language-rust\">{code}</code></pre>\
         <p>Text after the code block, long enough to need another chunk.</p>\
         <pre><code>short\n</code></pre><p>end</p>"
    );
    for overlap in [0, 15, 40] {
        let chunks = split(
            &html,
            SplitterOptions {
                chunk_size: 80,
                chunk_overlap: overlap,
                ..SplitterOptions::default()
            },
        );
        for chunk in &chunks {
            assert_eq!(fence_lines(&chunk.content) % 2, 0, "{:?}", chunk.content);
        }
        let with_rust: Vec<&MarkdownChunk> = chunks
            .iter()
            .filter(|chunk| chunk.content.contains("```rust"))
            .collect();
        assert_eq!(with_rust.len(), 1);
        assert_eq!(with_rust[0].metadata.code_block.as_deref(), Some("rust"));
    }
}

#[test]
fn thematic_break_flushes_with_line_ranges() {
    let chunks = split("<p>one</p><hr><p>two</p>", SplitterOptions::default());
    assert_eq!(contents(&chunks), vec!["one\n\n---", "two"]);
    assert_eq!((chunks[0].metadata.lines.from, chunks[0].metadata.lines.to), (1, 3));
    assert_eq!((chunks[1].metadata.lines.from, chunks[1].metadata.lines.to), (5, 5));
}

#[test]
fn returns_each_line() {
    let chunks = split(
        "<h1>T</h1><p>a<br>b</p>",
        SplitterOptions {
            return_each_line: true,
            ..SplitterOptions::default()
        },
    );
    assert_eq!(contents(&chunks), vec!["a", "b"]);
    assert_eq!(chunks[0].metadata.lines.from, 3);
    assert_eq!(chunks[1].metadata.lines.from, 4);
    assert!(chunks.iter().all(|chunk| chunk.metadata.headers == headers(&[("h1", "T")])));
}

#[test]
fn custom_length_function() {
    let words = LengthFunction::new(|text| text.split_whitespace().count());
    let chunks = split(
        LONG_PARAGRAPH,
        SplitterOptions {
            chunk_size: 5,
            chunk_overlap: 0,
            length_function: words,
            ..SplitterOptions::default()
        },
    );
    assert!(chunks.len() >= 5);
    assert!(chunks
        .iter()
        .all(|chunk| chunk.content.split_whitespace().count() <= 5));
}

#[test]
fn chunks_serialize_camel_case() {
    let chunks = split(
        "<h1>T</h1><pre><code class=\"language-sh\">ls\n</code></pre>",
        SplitterOptions::default(),
    );
    let value = serde_json::to_value(&chunks[0]).unwrap();
    assert_eq!(value["metadata"]["codeBlock"], "sh");
    assert_eq!(value["metadata"]["headers"]["h1"], "T");
    assert_eq!(value["metadata"]["lines"]["from"], 1);
}

#[test]
fn large_text_run_splits_in_linear_time() {
    let html = format!("<p>{}</p>", "lorem ipsum dolor sit amet ".repeat(40_000));
    let measured = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&measured);
    let chars = LengthFunction::new(move |text| {
        counter.fetch_add(text.len(), Ordering::Relaxed);
        text.chars().count()
    });
    let chunks = split(
        &html,
        SplitterOptions {
            length_function: chars,
            ..SplitterOptions::default()
        },
    );
    assert!(chunks.len() > 1000);
    assert!(chunks.iter().all(|chunk| chunk.content.chars().count() <= 1000));
    assert!(chunks.last().unwrap().content.ends_with("sit amet"));
    let measured = measured.load(Ordering::Relaxed);
    assert!(measured < html.len() * 64, "measured {measured} bytes");
}

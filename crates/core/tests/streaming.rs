use mdrift_core::{
    ConvertOptions, MarkdownStream, html_to_markdown, stream_html_to_markdown,
    stream_reader_to_markdown,
};

const DOCUMENT: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <title>Streaming &amp; parity</title>
  <style>body { color: red; } /* </p> */</style>
  <script>const s = "</div>"; const t = '<p>';</script>
</head>
<body>
  <!-- navigation -->
  <nav><ul><li><a href="/">Home</a></li><li><a href="/docs" title="Docs">Docs</a></li></ul></nav>
  <main>
    <h1>Caf&eacute; &#9749; guide</h1>
    <p>Plain text with <strong>bold</strong>, <em>emphasis</em>, <code>a|b`c</code> and a
       <a href="https://example.com/a b">spaced link</a>.</p>
    <blockquote><p>Quoted &gt; text</p><blockquote>nested</blockquote></blockquote>
    <ol start="3"><li>three<ul><li>inner</li></ul></li><li>four</li></ol>
    <pre><code class="language-rust">fn main() {
    println!("&lt;tag&gt; &amp; {}", 1);
}
</code></pre>
    <table>
      <thead><tr><th align="center">Col | A</th><th>B</th></tr></thead>
      <tbody><tr><td>1<br>2</td><td><img src="/i.png" alt="[img]"></td></tr></tbody>
    </table>
    <dl><dt>Term</dt><dd>Definition</dd></dl>
    <hr>
    <p>日本語のテキスト。<del>gone</del><sup>2</sup></p>
    <![CDATA[ignored]]>
  </main>
</body>
</html>"#;

fn expected() -> String {
    html_to_markdown(DOCUMENT, ConvertOptions::default())
}

fn split_chars(text: &str, plan: impl Fn(usize) -> usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut index = 0;
    while start < chars.len() {
        let end = (start + plan(index).max(1)).min(chars.len());
        pieces.push(chars[start..end].iter().collect());
        start = end;
        index += 1;
    }
    pieces
}

fn convert_pieces(pieces: &[String]) -> String {
    let mut stream = MarkdownStream::new(ConvertOptions::default());
    let mut out = String::new();
    for piece in pieces {
        out.push_str(&stream.push(piece));
    }
    out.push_str(&stream.finish());
    out
}

#[test]
fn document_converts() {
    let markdown = expected();
    assert!(markdown.starts_with("- [Home](/)\n- [Docs](/docs)\n\n# Café ☕ guide"));
    assert!(markdown.contains("```rust\nfn main() {\n    println!(\"<tag> & {}\", 1);\n}\n```"));
    assert!(markdown.contains("`a|b\\`c`"));
    assert!(markdown.contains("| Col \\| A | B |"));
    assert!(markdown.contains("<sup>2</sup>"));
    assert!(!markdown.contains("color"));
}

#[test]
fn fixed_chunk_sizes_match_single_call() {
    let expected = expected();
    for size in 1..=16 {
        let pieces = split_chars(DOCUMENT, |_| size);
        assert_eq!(convert_pieces(&pieces), expected, "chunk size {size}");
    }
}

#[test]
fn pseudo_random_chunk_plans_match_single_call() {
    let expected = expected();
    for seed in 1..=24u64 {
        let mut state = seed;
        let sizes: Vec<usize> = (0..DOCUMENT.len())
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                ((state >> 33) % 40) as usize + 1
            })
            .collect();
        let pieces = split_chars(DOCUMENT, |index| sizes[index]);
        assert_eq!(convert_pieces(&pieces), expected, "seed {seed}");
    }
}

#[test]
fn byte_level_splits_match_single_call() {
    let expected = expected();
    let bytes = DOCUMENT.as_bytes();
    for size in [1, 2, 3, 5, 7] {
        let mut stream = MarkdownStream::new(ConvertOptions::default());
        let mut out = String::new();
        for piece in bytes.chunks(size) {
            out.push_str(&stream.push_bytes(piece));
        }
        out.push_str(&stream.finish());
        assert_eq!(out, expected, "byte chunk size {size}");
    }
}

#[test]
fn adapters_match_single_call() {
    let expected = expected();
    let pieces = split_chars(DOCUMENT, |index| index % 9 + 1);
    let streamed: String = stream_html_to_markdown(pieces, ConvertOptions::default()).collect();
    assert_eq!(streamed, expected);

    let read: Result<Vec<String>, _> =
        stream_reader_to_markdown(DOCUMENT.as_bytes(), ConvertOptions::default()).collect();
    assert_eq!(read.unwrap().concat(), expected);
}

#[test]
fn output_is_released_before_the_end() {
    let mut stream = MarkdownStream::new(ConvertOptions::default());
    let mut released = 0;
    for piece in split_chars(DOCUMENT, |_| 64) {
        if !stream.push(&piece).is_empty() {
            released += 1;
        }
    }
    stream.finish();
    assert!(released > 5);
}

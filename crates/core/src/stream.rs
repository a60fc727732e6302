//! Incremental conversion.
//!
//! [`MarkdownStream`] accepts HTML in arbitrary pieces and returns the
//! Markdown that became final with each piece. Concatenating everything it
//! returns equals the single-call [`crate::html_to_markdown`] result for the
//! same input, wherever the piece boundaries fall.

use crate::error::MdriftError;
use crate::options::ConvertOptions;
use crate::processor::MarkdownProcessor;
use crate::tokenizer::{self, ParseState};
use std::io::Read;

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Streaming converter for one document.
#[derive(Debug)]
pub struct MarkdownStream {
    state: ParseState,
    processor: MarkdownProcessor,
    pending: String,
    carry: Vec<u8>,
}

impl MarkdownStream {
    /// Start a document.
    pub fn new(options: ConvertOptions) -> Self {
        Self {
            state: ParseState::new(),
            processor: MarkdownProcessor::new(options),
            pending: String::new(),
            carry: Vec::new(),
        }
    }

    /// Feed a piece of HTML; returns Markdown that is now final.
    pub fn push(&mut self, chunk: &str) -> String {
        if self.pending.is_empty() {
            let consumed = tokenizer::advance(&mut self.state, chunk, &mut self.processor);
            self.pending.push_str(&chunk[consumed..]);
        } else {
            self.pending.push_str(chunk);
            let consumed = tokenizer::advance(&mut self.state, &self.pending, &mut self.processor);
            self.pending.drain(..consumed);
        }
        self.processor.take_settled()
    }

    /// Feed raw bytes. A multi-byte character split across calls is carried
    /// over; invalid sequences become U+FFFD.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> String {
        let mut text = String::new();
        decode_utf8_chunk(&mut text, &mut self.carry, bytes);
        self.push(&text)
    }

    /// End the document and return the rest of the Markdown.
    pub fn finish(mut self) -> String {
        let mut out = String::new();
        if !self.carry.is_empty() {
            let tail = String::from_utf8_lossy(&self.carry).into_owned();
            self.carry.clear();
            out.push_str(&self.push(&tail));
        }
        tokenizer::finish(&mut self.state, &self.pending, &mut self.processor);
        self.pending.clear();
        out.push_str(&self.processor.take_remaining());
        out
    }
}

fn decode_utf8_chunk(text: &mut String, carry: &mut Vec<u8>, bytes: &[u8]) {
    let joined;
    let mut input = if carry.is_empty() {
        bytes
    } else {
        joined = [std::mem::take(carry).as_slice(), bytes].concat();
        joined.as_slice()
    };

    while !input.is_empty() {
        match std::str::from_utf8(input) {
            Ok(valid) => {
                text.push_str(valid);
                return;
            }
            Err(error) => {
                let (valid, rest) = input.split_at(error.valid_up_to());
                // `valid` is exactly the prefix the decoder accepted.
                text.push_str(&String::from_utf8_lossy(valid));
                match error.error_len() {
                    Some(len) => {
                        text.push('\u{FFFD}');
                        input = &rest[len..];
                    }
                    None => {
                        carry.extend_from_slice(rest);
                        return;
                    }
                }
            }
        }
    }
}

/// Iterator adapter converting a sequence of HTML pieces.
///
/// Yields non-empty Markdown pieces as they become final.
pub struct StreamIter<I> {
    chunks: I,
    stream: Option<MarkdownStream>,
}

impl<I, S> Iterator for StreamIter<I>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let stream = self.stream.as_mut()?;
            match self.chunks.next() {
                Some(chunk) => {
                    let out = stream.push(chunk.as_ref());
                    if !out.is_empty() {
                        return Some(out);
                    }
                }
                None => {
                    let out = self.stream.take()?.finish();
                    if !out.is_empty() {
                        return Some(out);
                    }
                }
            }
        }
    }
}

/// Convert HTML arriving as an iterator of pieces.
pub fn stream_html_to_markdown<I, S>(chunks: I, options: ConvertOptions) -> StreamIter<I::IntoIter>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    StreamIter {
        chunks: chunks.into_iter(),
        stream: Some(MarkdownStream::new(options)),
    }
}

/// Iterator converting HTML read from an [`std::io::Read`] source.
pub struct ReaderStream<R> {
    reader: R,
    buffer: Vec<u8>,
    stream: Option<MarkdownStream>,
}

impl<R: Read> Iterator for ReaderStream<R> {
    type Item = Result<String, MdriftError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let stream = self.stream.as_mut()?;
            let read = match self.reader.read(&mut self.buffer) {
                Ok(read) => read,
                Err(error) if error.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(error) => {
                    self.stream = None;
                    return Some(Err(error.into()));
                }
            };
            let out = if read == 0 {
                self.stream.take()?.finish()
            } else {
                stream.push_bytes(&self.buffer[..read])
            };
            if !out.is_empty() {
                return Some(Ok(out));
            }
        }
    }
}

/// Convert HTML read incrementally from `reader`.
pub fn stream_reader_to_markdown<R: Read>(reader: R, options: ConvertOptions) -> ReaderStream<R> {
    ReaderStream {
        reader,
        buffer: vec![0; READ_BUFFER_SIZE],
        stream: Some(MarkdownStream::new(options)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_split_multibyte_characters() {
        let mut text = String::new();
        let mut carry = Vec::new();
        let bytes = "né€".as_bytes();
        decode_utf8_chunk(&mut text, &mut carry, &bytes[..2]);
        assert_eq!(text, "n");
        assert_eq!(carry, vec![0xC3]);
        decode_utf8_chunk(&mut text, &mut carry, &bytes[2..4]);
        assert_eq!(text, "né");
        decode_utf8_chunk(&mut text, &mut carry, &bytes[4..]);
        assert_eq!(text, "né€");
        assert!(carry.is_empty());
    }

    #[test]
    fn replaces_invalid_bytes() {
        let mut text = String::new();
        let mut carry = Vec::new();
        decode_utf8_chunk(&mut text, &mut carry, b"a\xFFb");
        assert_eq!(text, "a\u{FFFD}b");
        assert!(carry.is_empty());
    }

    #[test]
    fn push_returns_settled_markdown() {
        let mut stream = MarkdownStream::new(ConvertOptions::default());
        assert_eq!(stream.push("<h1>Title</h1><p>Fir"), "# Title");
        assert_eq!(stream.push("st</p><p>Second"), "\n\nFirst");
        assert_eq!(stream.finish(), "\n\nSecond");
    }

    #[test]
    fn holds_back_incomplete_tags() {
        let mut stream = MarkdownStream::new(ConvertOptions::default());
        assert_eq!(stream.push("<p>a</p><a href=\"/x"), "a");
        assert_eq!(stream.push("\">link</a>"), "\n\n[link](/x)");
        assert_eq!(stream.finish(), "");
    }

    #[test]
    fn iterator_adapter_matches_single_call() {
        let html = "<ul><li>one</li><li>two</li></ul><p>after</p>";
        let pieces: Vec<String> =
            stream_html_to_markdown(html.split_inclusive('>'), ConvertOptions::default()).collect();
        assert!(pieces.iter().all(|piece| !piece.is_empty()));
        assert_eq!(pieces.concat(), crate::html_to_markdown(html, ConvertOptions::default()));
    }

    #[test]
    fn reader_adapter_decodes_bytes() {
        let html = "<p>caf\u{e9} \u{2615}</p>".repeat(2000);
        let pieces: Result<Vec<String>, MdriftError> =
            stream_reader_to_markdown(html.as_bytes(), ConvertOptions::default()).collect();
        let markdown = pieces.unwrap().concat();
        assert_eq!(markdown, crate::html_to_markdown(&html, ConvertOptions::default()));
        assert!(markdown.starts_with("caf\u{e9} \u{2615}\n\ncaf\u{e9}"));
    }
}

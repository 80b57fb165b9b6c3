// src/parse/lines.rs
use std::io::{self, BufRead};

use super::ParseError;

/// Reassembles physical lines into logical CSV lines.
///
/// A quoted field may contain newlines, so physical lines are joined with
/// `\n` until the buffer holds an even number of `"` characters. Reaching EOF
/// with an odd count is an [`ParseError::UnterminatedQuote`].
pub struct LogicalLines<R> {
    reader: R,
    buffer: String,
    open_quote: bool,
    /// physical line on which the current buffer started (1-based)
    start_line: usize,
    line_no: usize,
    done: bool,
}

impl<R: BufRead> LogicalLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: String::new(),
            open_quote: false,
            start_line: 0,
            line_no: 0,
            done: false,
        }
    }

    /// Number of physical lines consumed so far.
    pub fn physical_lines(&self) -> usize {
        self.line_no
    }

    /// Next physical line without its terminator. `\n`, `\r\n` and a lone
    /// `\r` all end a line.
    fn read_physical(&mut self) -> io::Result<Option<String>> {
        let mut bytes = Vec::new();
        let mut read_any = false;
        loop {
            let (terminator, used) = {
                let buf = self.reader.fill_buf()?;
                if buf.is_empty() {
                    break;
                }
                read_any = true;
                match buf.iter().position(|&b| b == b'\n' || b == b'\r') {
                    Some(i) => {
                        bytes.extend_from_slice(&buf[..i]);
                        (Some(buf[i]), i + 1)
                    }
                    None => {
                        bytes.extend_from_slice(buf);
                        (None, buf.len())
                    }
                }
            };
            self.reader.consume(used);

            match terminator {
                Some(b'\r') => {
                    // CRLF counts once, even across a buffer refill
                    if self.reader.fill_buf()?.first() == Some(&b'\n') {
                        self.reader.consume(1);
                    }
                    break;
                }
                Some(_) => break,
                None => {}
            }
        }

        if !read_any {
            return Ok(None);
        }
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl<R: BufRead> Iterator for LogicalLines<R> {
    type Item = Result<String, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let physical = match self.read_physical() {
                Ok(Some(l)) => l,
                Ok(None) => {
                    self.done = true;
                    if self.open_quote {
                        return Some(Err(ParseError::UnterminatedQuote {
                            line: self.start_line,
                        }));
                    }
                    // an even buffer is always flushed as soon as it closes
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(ParseError::Io(e)));
                }
            };
            self.line_no += 1;

            if self.open_quote {
                self.buffer.push('\n');
            } else {
                self.start_line = self.line_no;
            }
            self.buffer.push_str(&physical);

            // parity of the whole buffer, tracked incrementally
            let quotes = physical.bytes().filter(|&b| b == b'"').count();
            if quotes % 2 == 1 {
                self.open_quote = !self.open_quote;
            }

            if !self.open_quote {
                return Some(Ok(std::mem::take(&mut self.buffer)));
            }
        }
    }
}

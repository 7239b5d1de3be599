use std::collections::VecDeque;

use crate::error::Result;
use crate::source::CharSource;

/// A character cursor with unbounded lookahead over a [`CharSource`].
///
/// Peeking and consuming are byte-for-byte equivalent to reading into a
/// buffer and restoring it; the cursor never skips input. The grammar only
/// needs a handful of characters of lookahead (the longest separator), but
/// the buffer imposes no limit.
#[derive(Debug)]
pub struct RetryReader<R> {
    source: R,
    lookahead: VecDeque<char>,
    eof: bool,
}

impl<R: CharSource> RetryReader<R> {
    /// Wrap a character source.
    pub fn new(source: R) -> RetryReader<R> {
        RetryReader {
            source,
            lookahead: VecDeque::new(),
            eof: false,
        }
    }

    /// Make sure at least `n` characters are buffered, or as many as the
    /// source still has. Returns how many are available.
    fn fill(&mut self, n: usize) -> Result<usize> {
        while self.lookahead.len() < n && !self.eof {
            match self.source.read_one_char()? {
                Some(ch) => self.lookahead.push_back(ch),
                None => self.eof = true,
            }
        }
        Ok(self.lookahead.len().min(n))
    }

    /// Examine the next `n` characters without consuming them; fewer are
    /// returned at end of input.
    pub fn peek(&mut self, n: usize) -> Result<Vec<char>> {
        let available = self.fill(n)?;
        Ok(self.lookahead.iter().take(available).copied().collect())
    }

    /// Examine the next character without consuming it.
    pub fn peek_char(&mut self) -> Result<Option<char>> {
        self.fill(1)?;
        Ok(self.lookahead.front().copied())
    }

    /// Consume and return the next character.
    pub fn next_char(&mut self) -> Result<Option<char>> {
        self.fill(1)?;
        Ok(self.lookahead.pop_front())
    }

    /// Restore a character so the next read sees it again.
    pub fn push_back(&mut self, ch: char) {
        self.lookahead.push_front(ch);
    }

    /// True iff the upcoming characters equal `literal`.
    pub fn matches(&mut self, literal: &str) -> Result<bool> {
        let n = literal.chars().count();
        if self.fill(n)? < n {
            return Ok(false);
        }
        Ok(self.lookahead.iter().zip(literal.chars()).all(|(a, b)| *a == b))
    }

    /// If the upcoming characters equal `literal`, advance past them and
    /// return true; otherwise leave the cursor untouched.
    pub fn consume(&mut self, literal: &str) -> Result<bool> {
        if !self.matches(literal)? {
            return Ok(false);
        }
        for _ in literal.chars() {
            self.lookahead.pop_front();
        }
        Ok(true)
    }

    /// If the next character equals `ch`, advance past it and return true.
    pub fn consume_char(&mut self, ch: char) -> Result<bool> {
        if self.peek_char()? == Some(ch) {
            self.lookahead.pop_front();
            return Ok(true);
        }
        Ok(false)
    }

    /// Advance while `predicate` holds and return the consumed span.
    pub fn read_while(&mut self, mut predicate: impl FnMut(char) -> bool) -> Result<String> {
        let mut span = String::new();
        while let Some(ch) = self.peek_char()? {
            if !predicate(ch) {
                break;
            }
            self.lookahead.pop_front();
            span.push(ch);
        }
        Ok(span)
    }

    /// True iff no further characters exist.
    pub fn at_eof(&mut self) -> Result<bool> {
        self.fill(1)?;
        Ok(self.lookahead.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(text: &str) -> RetryReader<std::str::Chars<'_>> {
        RetryReader::new(text.chars())
    }

    #[test]
    fn peek_does_not_consume() {
        let mut rdr = reader("abc");
        assert_eq!(rdr.peek(2).unwrap(), vec!['a', 'b']);
        assert_eq!(rdr.peek(2).unwrap(), vec!['a', 'b']);
        assert_eq!(rdr.next_char().unwrap(), Some('a'));
    }

    #[test]
    fn peek_returns_fewer_at_eof() {
        let mut rdr = reader("ab");
        assert_eq!(rdr.peek(5).unwrap(), vec!['a', 'b']);
    }

    #[test]
    fn consume_advances_only_on_match() {
        let mut rdr = reader("||rest");
        assert!(!rdr.consume("|-").unwrap());
        assert!(rdr.consume("||").unwrap());
        assert_eq!(rdr.next_char().unwrap(), Some('r'));
    }

    #[test]
    fn consume_never_partially_advances() {
        let mut rdr = reader("ab");
        assert!(!rdr.consume("abc").unwrap());
        assert_eq!(rdr.next_char().unwrap(), Some('a'));
        assert_eq!(rdr.next_char().unwrap(), Some('b'));
    }

    #[test]
    fn read_while_stops_at_predicate_failure() {
        let mut rdr = reader("123abc");
        let span = rdr.read_while(|c| c.is_ascii_digit()).unwrap();
        assert_eq!(span, "123");
        assert_eq!(rdr.next_char().unwrap(), Some('a'));
    }

    #[test]
    fn push_back_restores_a_character() {
        let mut rdr = reader("bc");
        rdr.push_back('a');
        assert_eq!(rdr.next_char().unwrap(), Some('a'));
        assert_eq!(rdr.next_char().unwrap(), Some('b'));
    }

    #[test]
    fn at_eof_is_stable() {
        let mut rdr = reader("");
        assert!(rdr.at_eof().unwrap());
        assert!(rdr.at_eof().unwrap());
        assert_eq!(rdr.next_char().unwrap(), None);
    }
}

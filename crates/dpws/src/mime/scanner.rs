// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Streaming delimiter search (Knuth-Morris-Pratt).
//!
//! The delimiter is `CRLF "--" boundary`. Bytes are pushed one at a time; bytes
//! that might still be the start of a delimiter are held back and released
//! as data once a mismatch proves they are not. Nothing beyond the delimiter
//! length is ever buffered.

/// Incremental matcher for one multipart delimiter.
#[derive(Debug, Clone)]
pub struct BoundaryMatcher {
    pattern: Vec<u8>,
    failure: Vec<usize>,
    matched: usize,
}

impl BoundaryMatcher {
    pub fn new(boundary: &str) -> Self {
        let mut pattern = Vec::with_capacity(boundary.len() + 4);
        pattern.extend_from_slice(b"\r\n--");
        pattern.extend_from_slice(boundary.as_bytes());
        let failure = failure_function(&pattern);
        Self {
            pattern,
            failure,
            matched: 0,
        }
    }

    /// Full delimiter bytes (`\r\n--boundary`).
    pub fn pattern(&self) -> &[u8] {
        &self.pattern
    }

    /// Forget any partial match.
    ///
    /// With `at_line_start` the leading CRLF counts as already seen, so a
    /// body that opens directly with `--boundary` is recognised. A later
    /// mismatch then releases a CRLF that was never read; only use it where
    /// the released bytes are discarded (the preamble).
    pub fn reset(&mut self, at_line_start: bool) {
        self.matched = if at_line_start { 2 } else { 0 };
    }

    /// Bytes currently held back as a possible delimiter prefix.
    pub fn pending(&self) -> usize {
        self.matched
    }

    /// Feed one byte. Returns true when the delimiter completes; confirmed
    /// data bytes are appended to `out`.
    pub fn push<E: Extend<u8>>(&mut self, byte: u8, out: &mut E) -> bool {
        loop {
            if self.pattern[self.matched] == byte {
                self.matched += 1;
                if self.matched == self.pattern.len() {
                    self.matched = 0;
                    return true;
                }
                return false;
            }
            if self.matched == 0 {
                out.extend(std::iter::once(byte));
                return false;
            }
            let keep = self.failure[self.matched - 1];
            out.extend(self.pattern[..self.matched - keep].iter().copied());
            self.matched = keep;
        }
    }
}

/// `failure[i]` = length of the longest proper prefix of `pattern[..=i]` that
/// is also its suffix.
fn failure_function(pattern: &[u8]) -> Vec<usize> {
    let mut failure = vec![0usize; pattern.len()];
    let mut k = 0;
    for i in 1..pattern.len() {
        while k > 0 && pattern[i] != pattern[k] {
            k = failure[k - 1];
        }
        if pattern[i] == pattern[k] {
            k += 1;
        }
        failure[i] = k;
    }
    failure
}

/// Offset of the first delimiter in `haystack`, if any.
pub fn find_delimiter(haystack: &[u8], boundary: &str) -> Option<usize> {
    let mut matcher = BoundaryMatcher::new(boundary);
    let mut sink = Sink;
    for (i, b) in haystack.iter().enumerate() {
        if matcher.push(*b, &mut sink) {
            return Some(i + 1 - matcher.pattern().len());
        }
    }
    None
}

struct Sink;

impl Extend<u8> for Sink {
    fn extend<T: IntoIterator<Item = u8>>(&mut self, iter: T) {
        iter.into_iter().for_each(drop);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(input: &[u8], boundary: &str) -> (Vec<u8>, bool) {
        let mut m = BoundaryMatcher::new(boundary);
        let mut out = Vec::new();
        for b in input {
            if m.push(*b, &mut out) {
                return (out, true);
            }
        }
        (out, false)
    }

    #[test]
    fn test_failure_function() {
        assert_eq!(failure_function(b"abab"), vec![0, 0, 1, 2]);
        assert_eq!(failure_function(b"aaab"), vec![0, 1, 2, 0]);
    }

    #[test]
    fn test_data_before_delimiter() {
        let (data, found) = scan(b"hello world\r\n--xyz rest", "xyz");
        assert!(found);
        assert_eq!(data, b"hello world");
    }

    #[test]
    fn test_partial_delimiters_are_released_as_data() {
        let (data, found) = scan(b"a\r\n-b\r\n--xy\r\n\r\n--xyz", "xyz");
        assert!(found);
        assert_eq!(data, b"a\r\n-b\r\n--xy\r\n");
    }

    #[test]
    fn test_no_delimiter() {
        let (data, found) = scan(b"plain\r\n--xy", "xyz");
        assert!(!found);
        assert_eq!(data, b"plain");
    }

    #[test]
    fn test_line_start_reset_matches_leading_boundary() {
        let mut m = BoundaryMatcher::new("b1");
        m.reset(true);
        let mut out = Vec::new();
        let mut found = false;
        for b in b"--b1" {
            found = m.push(*b, &mut out);
        }
        assert!(found);
        assert!(out.is_empty());
    }

    #[test]
    fn test_find_delimiter_offset() {
        assert_eq!(find_delimiter(b"abc\r\n--q", "q"), Some(3));
        assert_eq!(find_delimiter(b"abc", "q"), None);
    }
}

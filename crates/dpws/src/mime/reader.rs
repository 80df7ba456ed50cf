// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Streaming multipart reader.
//!
//! The reader owns the underlying byte stream; every part is exposed as a
//! [`MimePart`] handle that reads up to (not including) the next delimiter.
//! Handles can be moved to other threads. Only the current part's handles are
//! readable: once the reader advances, older handles fail with
//! [`MimeError::StalePart`].
//!
//! In synchronized mode [`MultipartReader::advance_to_next_part`] waits until
//! the consumer of a handed-out part has read it to the end or dropped it, and
//! reports the consumer's error if the part failed.

use super::header::MimeBodyHeader;
use super::scanner::BoundaryMatcher;
use super::MimeError;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::io::{self, Read};
use std::sync::Arc;

const READ_BUFFER: usize = 8 * 1024;
const MAX_PART_HEADER: usize = 16 * 1024;

struct ByteSource<R> {
    inner: R,
    buf: Box<[u8]>,
    pos: usize,
    filled: usize,
}

impl<R: Read> ByteSource<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            buf: vec![0u8; READ_BUFFER].into_boxed_slice(),
            pos: 0,
            filled: 0,
        }
    }

    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        if self.pos == self.filled {
            loop {
                match self.inner.read(&mut self.buf) {
                    Ok(0) => return Ok(None),
                    Ok(n) => {
                        self.filled = n;
                        self.pos = 0;
                        break;
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            }
        }
        let b = self.buf[self.pos];
        self.pos += 1;
        Ok(Some(b))
    }
}

struct State<R> {
    source: ByteSource<R>,
    matcher: BoundaryMatcher,
    pending: VecDeque<u8>,
    current: u64,
    at_delimiter: bool,
    finished: bool,
    handed_out: bool,
    completed: bool,
    error: Option<MimeError>,
}

impl<R: Read> State<R> {
    fn require_byte(&mut self) -> Result<u8, MimeError> {
        self.source.next_byte()?.ok_or(MimeError::UnexpectedEnd)
    }

    /// Skip the preamble up to and including the first delimiter.
    fn skip_preamble(&mut self) -> Result<(), MimeError> {
        self.matcher.reset(true);
        let mut discard = Vec::new();
        loop {
            let b = self
                .source
                .next_byte()?
                .ok_or_else(|| MimeError::Malformed("no opening boundary".into()))?;
            if self.matcher.push(b, &mut discard) {
                return Ok(());
            }
            discard.clear();
        }
    }

    /// Buffer up to `want` bytes of the current part.
    fn fill(&mut self, want: usize) -> Result<(), MimeError> {
        while self.pending.len() < want && !self.at_delimiter {
            let b = self.require_byte()?;
            if self.matcher.push(b, &mut self.pending) {
                self.at_delimiter = true;
            }
        }
        Ok(())
    }

    fn read_part(&mut self, buf: &mut [u8]) -> Result<usize, MimeError> {
        self.fill(buf.len())?;
        let n = buf.len().min(self.pending.len());
        for (dst, src) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn skip_rest(&mut self) -> Result<(), MimeError> {
        loop {
            self.pending.clear();
            if self.at_delimiter {
                return Ok(());
            }
            self.fill(READ_BUFFER)?;
        }
    }

    /// Classify what follows a delimiter: `--` closes the body, CRLF opens
    /// another part whose header block is returned.
    fn after_delimiter(&mut self) -> Result<Option<MimeBodyHeader>, MimeError> {
        let mut b = self.require_byte()?;
        if b == b'-' {
            if self.require_byte()? == b'-' {
                self.finished = true;
                return Ok(None);
            }
            return Err(MimeError::Malformed("incomplete closing delimiter".into()));
        }
        // Transport padding.
        while b == b' ' || b == b'\t' {
            b = self.require_byte()?;
        }
        if b != b'\r' || self.require_byte()? != b'\n' {
            return Err(MimeError::Malformed("delimiter not followed by CRLF".into()));
        }
        self.read_header_block().map(Some)
    }

    fn read_header_block(&mut self) -> Result<MimeBodyHeader, MimeError> {
        let mut lines = Vec::new();
        let mut line = Vec::new();
        let mut total = 0usize;
        loop {
            let b = self.require_byte()?;
            total += 1;
            if total > MAX_PART_HEADER {
                return Err(MimeError::Malformed("part header too large".into()));
            }
            if b != b'\n' {
                line.push(b);
                continue;
            }
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.is_empty() {
                break;
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
            line.clear();
        }
        MimeBodyHeader::parse_lines(lines.iter().map(String::as_str))
    }

    fn open_next(&mut self, header: Option<MimeBodyHeader>) -> Option<MimeBodyHeader> {
        self.current += 1;
        self.handed_out = false;
        self.completed = false;
        self.at_delimiter = false;
        self.pending.clear();
        self.matcher.reset(false);
        header
    }
}

struct Shared<R> {
    state: Mutex<State<R>>,
    cond: Condvar,
}

/// Reader over a `multipart/*` body.
///
/// Construction consumes the preamble and the first part's header block, so
/// the reader starts positioned on part one. A three-part body therefore
/// advances `true`, `true`, `false`.
pub struct MultipartReader<R> {
    shared: Arc<Shared<R>>,
    headers: MimeBodyHeader,
    synchronized: bool,
}

impl<R: Read> MultipartReader<R> {
    pub fn new(source: R, boundary: &str) -> Result<Self, MimeError> {
        if boundary.is_empty() || boundary.len() > 70 {
            return Err(MimeError::Malformed(format!(
                "invalid boundary length {}",
                boundary.len()
            )));
        }
        let mut state = State {
            source: ByteSource::new(source),
            matcher: BoundaryMatcher::new(boundary),
            pending: VecDeque::new(),
            current: 0,
            at_delimiter: false,
            finished: false,
            handed_out: false,
            completed: false,
            error: None,
        };
        state.skip_preamble()?;
        let headers = match state.after_delimiter()? {
            Some(h) => h,
            None => return Err(MimeError::Malformed("multipart body has no parts".into())),
        };
        state.open_next(None);
        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                cond: Condvar::new(),
            }),
            headers,
            synchronized: false,
        })
    }

    /// Wait for handed-out parts to be consumed before advancing.
    pub fn synchronized(mut self, enabled: bool) -> Self {
        self.synchronized = enabled;
        self
    }

    /// Header block of the current part.
    pub fn headers(&self) -> &MimeBodyHeader {
        &self.headers
    }

    /// 1-based index of the current part.
    pub fn part_index(&self) -> u64 {
        self.shared.state.lock().current
    }

    pub fn is_finished(&self) -> bool {
        self.shared.state.lock().finished
    }

    /// Handle on the current part's bytes.
    pub fn part(&self) -> Result<MimePart<R>, MimeError> {
        let mut st = self.shared.state.lock();
        if st.finished {
            return Err(MimeError::StalePart);
        }
        st.handed_out = true;
        Ok(MimePart {
            shared: Arc::clone(&self.shared),
            index: st.current,
            headers: self.headers.clone(),
        })
    }

    /// Read the rest of the current part into memory.
    pub fn read_part_to_end(&self) -> Result<Vec<u8>, MimeError> {
        let mut part = self.part()?;
        let mut out = Vec::new();
        part.read_to_end(&mut out).map_err(MimeError::from_io)?;
        Ok(out)
    }

    /// Move to the next part, discarding whatever is left of the current one.
    ///
    /// Returns `false` once the closing delimiter has been read. In
    /// synchronized mode this blocks until a handed-out handle on the current
    /// part reaches its end or is dropped; do not call it from the thread
    /// that still owns that handle.
    pub fn advance_to_next_part(&mut self) -> Result<bool, MimeError> {
        let mut st = self.shared.state.lock();
        if let Some(e) = st.error.clone() {
            return Err(e);
        }
        if st.finished {
            return Ok(false);
        }
        if self.synchronized && st.handed_out {
            while !st.completed {
                self.shared.cond.wait(&mut st);
            }
            if let Some(e) = st.error.clone() {
                return Err(e);
            }
        }

        let next = match st.skip_rest() {
            Ok(()) => st.after_delimiter(),
            Err(e) => Err(e),
        };
        match next {
            Ok(Some(headers)) => {
                st.open_next(None);
                self.headers = headers;
                Ok(true)
            }
            Ok(None) => {
                // Invalidate handles on the last part.
                st.open_next(None);
                self.headers = MimeBodyHeader::new();
                Ok(false)
            }
            Err(e) => {
                log::debug!("[mime] advance failed: {}", e);
                st.error = Some(e.clone());
                Err(e)
            }
        }
    }
}

/// Bounded view of one part; end-of-stream at the next delimiter.
pub struct MimePart<R> {
    shared: Arc<Shared<R>>,
    index: u64,
    headers: MimeBodyHeader,
}

impl<R> MimePart<R> {
    pub fn headers(&self) -> &MimeBodyHeader {
        &self.headers
    }

    /// 1-based index of the part this handle reads.
    pub fn index(&self) -> u64 {
        self.index
    }
}

impl<R: Read> Read for MimePart<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut st = self.shared.state.lock();
        if st.current != self.index || st.finished {
            return Err(MimeError::StalePart.into());
        }
        if let Some(e) = st.error.clone() {
            return Err(e.into());
        }
        match st.read_part(buf) {
            Ok(0) if !buf.is_empty() => {
                st.completed = true;
                self.shared.cond.notify_all();
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) => {
                st.error = Some(e.clone());
                st.completed = true;
                self.shared.cond.notify_all();
                Err(e.into())
            }
        }
    }
}

impl<R> Drop for MimePart<R> {
    fn drop(&mut self) {
        let mut st = self.shared.state.lock();
        if st.current == self.index {
            st.completed = true;
            self.shared.cond.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::thread;
    use std::time::Duration;

    const BODY: &[u8] = b"preamble text\r\n\
--frontier\r\n\
Content-Type: text/plain\r\n\
Content-ID: <one>\r\n\
\r\n\
first part\r\n\
--frontier\r\n\
Content-Type: application/octet-stream\r\n\
\r\n\
second\r\n--front not yet\r\n\
--frontier \t\r\n\
\r\n\
third\r\n\
--frontier--\r\n\
epilogue";

    /// Hands out one byte per read call.
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0.is_empty() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.0[0];
            self.0 = &self.0[1..];
            Ok(1)
        }
    }

    #[test]
    fn test_three_parts_true_true_false() {
        let mut reader = MultipartReader::new(Cursor::new(BODY), "frontier").unwrap();
        assert_eq!(reader.headers().content_type(), Some("text/plain"));
        assert_eq!(reader.headers().content_id(), Some("one"));
        assert_eq!(reader.read_part_to_end().unwrap(), b"first part");

        assert!(reader.advance_to_next_part().unwrap());
        assert_eq!(reader.part_index(), 2);
        assert_eq!(reader.read_part_to_end().unwrap(), b"second\r\n--front not yet");

        assert!(reader.advance_to_next_part().unwrap());
        assert!(reader.headers().is_empty());
        assert_eq!(reader.read_part_to_end().unwrap(), b"third");

        assert!(!reader.advance_to_next_part().unwrap());
        assert!(reader.is_finished());
        assert!(!reader.advance_to_next_part().unwrap());
    }

    #[test]
    fn test_one_byte_reads() {
        let mut reader = MultipartReader::new(Trickle(BODY), "frontier").unwrap();
        let mut parts = vec![reader.read_part_to_end().unwrap()];
        while reader.advance_to_next_part().unwrap() {
            parts.push(reader.read_part_to_end().unwrap());
        }
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2], b"third");
    }

    #[test]
    fn test_unread_part_is_skipped() {
        let mut reader = MultipartReader::new(Cursor::new(BODY), "frontier").unwrap();
        assert!(reader.advance_to_next_part().unwrap());
        assert!(reader.advance_to_next_part().unwrap());
        assert_eq!(reader.read_part_to_end().unwrap(), b"third");
    }

    #[test]
    fn test_stale_part_is_usage_error() {
        let mut reader = MultipartReader::new(Cursor::new(BODY), "frontier").unwrap();
        let mut first = reader.part().unwrap();
        assert!(reader.advance_to_next_part().unwrap());
        let mut buf = [0u8; 4];
        let err = first.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        assert_eq!(MimeError::from_io(err), MimeError::StalePart);
    }

    #[test]
    fn test_missing_opening_boundary() {
        let err = MultipartReader::new(Cursor::new(&b"no parts here"[..]), "x").err();
        assert!(matches!(err, Some(MimeError::Malformed(_))));
    }

    #[test]
    fn test_garbage_after_delimiter() {
        let body = b"--b\r\n\r\none\r\n--bXX";
        let mut reader = MultipartReader::new(Cursor::new(&body[..]), "b").unwrap();
        assert!(matches!(
            reader.advance_to_next_part(),
            Err(MimeError::Malformed(_))
        ));
        // Sticky
        assert!(reader.advance_to_next_part().is_err());
    }

    #[test]
    fn test_truncated_body() {
        let body = b"--b\r\n\r\nnever closed";
        let mut reader = MultipartReader::new(Cursor::new(&body[..]), "b").unwrap();
        assert_eq!(reader.read_part_to_end(), Err(MimeError::UnexpectedEnd));
        assert_eq!(reader.advance_to_next_part(), Err(MimeError::UnexpectedEnd));
    }

    #[test]
    fn test_synchronized_handoff_waits_for_consumer() {
        let mut reader = MultipartReader::new(Cursor::new(BODY), "frontier")
            .unwrap()
            .synchronized(true);
        let mut part = reader.part().unwrap();
        let consumer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            let mut out = Vec::new();
            part.read_to_end(&mut out).unwrap();
            out
        });
        assert!(reader.advance_to_next_part().unwrap());
        assert_eq!(consumer.join().unwrap(), b"first part");
        assert_eq!(reader.read_part_to_end().unwrap(), b"second\r\n--front not yet");
    }

    #[test]
    fn test_synchronized_consumer_error_propagates() {
        let body = b"--b\r\n\r\ntruncated";
        let mut reader = MultipartReader::new(Cursor::new(&body[..]), "b")
            .unwrap()
            .synchronized(true);
        let mut part = reader.part().unwrap();
        let consumer = thread::spawn(move || {
            let mut out = Vec::new();
            part.read_to_end(&mut out).is_err()
        });
        assert_eq!(reader.advance_to_next_part(), Err(MimeError::UnexpectedEnd));
        assert!(consumer.join().unwrap());
    }
}

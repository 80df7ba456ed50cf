// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request body framing.

use super::chunked::ChunkedReader;
use std::io::{self, BufRead, Read};

enum Framing<'a> {
    Empty,
    Fixed(io::Take<&'a mut dyn BufRead>),
    Chunked(ChunkedReader<&'a mut dyn BufRead>),
}

/// Body of one request, bounded by its framing.
///
/// Reading past the end yields EOF, never bytes of the next request.
pub struct RequestBody<'a> {
    framing: Framing<'a>,
}

impl<'a> RequestBody<'a> {
    pub fn empty() -> Self {
        Self {
            framing: Framing::Empty,
        }
    }

    pub fn fixed(reader: &'a mut dyn BufRead, length: u64) -> Self {
        Self {
            framing: Framing::Fixed(reader.take(length)),
        }
    }

    pub fn chunked(reader: &'a mut dyn BufRead) -> Self {
        Self {
            framing: Framing::Chunked(ChunkedReader::new(reader)),
        }
    }

    /// Declared length, when known up front.
    pub fn declared_length(&self) -> Option<u64> {
        match &self.framing {
            Framing::Empty => Some(0),
            Framing::Fixed(take) => Some(take.limit()),
            Framing::Chunked(_) => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        match &self.framing {
            Framing::Empty => true,
            Framing::Fixed(take) => take.limit() == 0,
            Framing::Chunked(reader) => reader.is_done(),
        }
    }

    /// Discard whatever the handler left unread.
    pub fn drain(&mut self) -> io::Result<u64> {
        io::copy(self, &mut io::sink())
    }
}

impl Read for RequestBody<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.framing {
            Framing::Empty => Ok(0),
            Framing::Fixed(take) => {
                let want = take.limit();
                let n = take.read(buf)?;
                if n == 0 && want > 0 && !buf.is_empty() {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "request body truncated",
                    ));
                }
                Ok(n)
            }
            Framing::Chunked(reader) => reader.read(buf),
        }
    }
}

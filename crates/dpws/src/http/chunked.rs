// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `Transfer-Encoding: chunked` codec.

use super::header::read_line;
use std::io::{self, BufRead, Read, Write};

const MAX_CHUNK_LINE: usize = 1024;

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

/// Decodes a chunked body; EOF after the last chunk and its trailers.
pub struct ChunkedReader<R> {
    inner: R,
    remaining: u64,
    done: bool,
}

impl<R: BufRead> ChunkedReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            remaining: 0,
            done: false,
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn next_line(&mut self) -> io::Result<String> {
        read_line(&mut self.inner, MAX_CHUNK_LINE)
            .map_err(io::Error::from)?
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "chunked body truncated"))
    }

    fn start_chunk(&mut self) -> io::Result<()> {
        let line = self.next_line()?;
        let size = line.split(';').next().unwrap_or_default().trim();
        self.remaining =
            u64::from_str_radix(size, 16).map_err(|_| invalid("bad chunk size line"))?;
        if self.remaining == 0 {
            // Trailer fields are ignored.
            while !self.next_line()?.is_empty() {}
            self.done = true;
        }
        Ok(())
    }
}

impl<R: BufRead> Read for ChunkedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.done || buf.is_empty() {
            return Ok(0);
        }
        if self.remaining == 0 {
            self.start_chunk()?;
            if self.done {
                return Ok(0);
            }
        }
        let want = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..want])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "chunked body truncated",
            ));
        }
        self.remaining -= n as u64;
        if self.remaining == 0 && !self.next_line()?.is_empty() {
            return Err(invalid("chunk not followed by CRLF"));
        }
        Ok(n)
    }
}

/// Encodes writes as chunks. [`ChunkedWriter::finish`] writes the last
/// chunk; dropping without it leaves the body unterminated.
pub struct ChunkedWriter<W: Write> {
    inner: W,
    buf: Vec<u8>,
    chunk_size: usize,
}

impl<W: Write> ChunkedWriter<W> {
    pub fn new(inner: W, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            inner,
            buf: Vec::with_capacity(chunk_size),
            chunk_size,
        }
    }

    fn emit(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        write!(self.inner, "{:x}\r\n", self.buf.len())?;
        self.inner.write_all(&self.buf)?;
        self.inner.write_all(b"\r\n")?;
        self.buf.clear();
        Ok(())
    }

    pub fn finish(mut self) -> io::Result<W> {
        self.emit()?;
        self.inner.write_all(b"0\r\n\r\n")?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for ChunkedWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let room = self.chunk_size - self.buf.len();
        let n = room.min(data.len());
        self.buf.extend_from_slice(&data[..n]);
        if self.buf.len() == self.chunk_size {
            self.emit()?;
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.emit()?;
        self.inner.flush()
    }
}

/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::BufMut;
use tokio::io::{AsyncBufRead, AsyncRead, ReadBuf};

use super::HttpBodyType;
use crate::parse::HttpChunkedLine;

const HTML_OPEN_TAG: &[u8] = b"<html";
const HTML_CLOSE_TAG: &[u8] = b"</html";

#[derive(Clone, Copy)]
enum NextStep {
    Data,
    ChunkHeader,
    ChunkEndCr,
    ChunkEndLf,
    UntilEnd,
    Finished,
}

#[derive(Clone, Copy)]
enum HtmlSniff {
    Unknown,
    Watching,
    Off,
}

fn contains_tag_ignore_case(data: &[u8], tag: &[u8]) -> bool {
    let mut offset = 0;
    while let Some(p) = memchr::memchr(b'<', &data[offset..]) {
        let start = offset + p;
        if data.len() - start < tag.len() {
            return false;
        }
        if data[start..start + tag.len()].eq_ignore_ascii_case(tag) {
            return true;
        }
        offset = start + 1;
    }
    false
}

/// decode progress for one response body, kept apart from the reader so the
/// owner can resume draining across multiple borrows of the same stream
pub struct HttpBodyDecodeState {
    body_type: HttpBodyType,
    body_line_max_len: usize,
    next_step: NextStep,
    chunk_header: Vec<u8>,
    this_chunk_size: u64,
    left_size: u64,
    sniff: HtmlSniff,
    wire_read: u64,
}

impl HttpBodyDecodeState {
    pub fn new(body_type: HttpBodyType, body_line_max_len: usize) -> Self {
        let (next_step, left_size) = match body_type {
            HttpBodyType::ContentLength(0) => (NextStep::Finished, 0),
            HttpBodyType::ContentLength(n) => (NextStep::Data, n),
            HttpBodyType::Chunked => (NextStep::ChunkHeader, 0),
            HttpBodyType::ReadUntilEnd => (NextStep::UntilEnd, 0),
        };
        HttpBodyDecodeState {
            body_type,
            body_line_max_len,
            next_step,
            chunk_header: Vec::with_capacity(32),
            this_chunk_size: 0,
            left_size,
            sniff: HtmlSniff::Unknown,
            wire_read: 0,
        }
    }

    pub fn reader<'a, R>(&'a mut self, reader: &'a mut R) -> HttpBodyDecodeReader<'a, R>
    where
        R: AsyncBufRead + Unpin,
    {
        HttpBodyDecodeReader {
            state: self,
            reader,
        }
    }

    pub fn finished(&self) -> bool {
        matches!(self.next_step, NextStep::Finished)
    }

    /// wire bytes consumed so far, including any chunk framing
    pub fn wire_read(&self) -> u64 {
        self.wire_read
    }

    fn scan_html_markers(&mut self, data: &[u8]) -> bool {
        match self.sniff {
            HtmlSniff::Off => false,
            HtmlSniff::Watching => contains_tag_ignore_case(data, HTML_CLOSE_TAG),
            HtmlSniff::Unknown => {
                if contains_tag_ignore_case(data, HTML_OPEN_TAG) {
                    self.sniff = HtmlSniff::Watching;
                    contains_tag_ignore_case(data, HTML_CLOSE_TAG)
                } else {
                    self.sniff = HtmlSniff::Off;
                    false
                }
            }
        }
    }

    fn end_of_chunk(&mut self) {
        self.next_step = if self.this_chunk_size == 0 {
            NextStep::Finished
        } else {
            NextStep::ChunkHeader
        };
    }
}

/// strips the body transfer framing and yields the payload bytes,
/// while counting the wire bytes consumed framing included
pub struct HttpBodyDecodeReader<'a, R> {
    state: &'a mut HttpBodyDecodeState,
    reader: &'a mut R,
}

impl<'a, R> HttpBodyDecodeReader<'a, R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: &'a mut R, state: &'a mut HttpBodyDecodeState) -> Self {
        HttpBodyDecodeReader { state, reader }
    }

    pub fn finished(&self) -> bool {
        self.state.finished()
    }

    pub fn wire_read(&self) -> u64 {
        self.state.wire_read()
    }

    fn poll_decode(&mut self, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let state = &mut *self.state;
        loop {
            match state.next_step {
                NextStep::Finished => return Poll::Ready(Ok(())),
                NextStep::UntilEnd => {
                    if buf.remaining() == 0 {
                        return Poll::Ready(Ok(()));
                    }
                    let filled = buf.filled().len();
                    ready!(Pin::new(&mut *self.reader).poll_read(cx, buf))?;
                    let nr = buf.filled().len() - filled;
                    if nr == 0 {
                        state.next_step = NextStep::Finished;
                    } else {
                        state.wire_read += nr as u64;
                        if state.scan_html_markers(&buf.filled()[filled..]) {
                            state.next_step = NextStep::Finished;
                        }
                    }
                    return Poll::Ready(Ok(()));
                }
                NextStep::Data => {
                    if buf.remaining() == 0 {
                        return Poll::Ready(Ok(()));
                    }
                    let to_read = usize::try_from(state.left_size)
                        .unwrap_or(usize::MAX)
                        .min(buf.remaining());
                    let mut data_buf = ReadBuf::new(buf.initialize_unfilled_to(to_read));
                    ready!(Pin::new(&mut *self.reader).poll_read(cx, &mut data_buf))?;
                    let nr = data_buf.filled().len();
                    if nr == 0 {
                        return Poll::Ready(Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "reader closed while reading body data",
                        )));
                    }
                    buf.advance(nr);
                    state.wire_read += nr as u64;
                    state.left_size -= nr as u64;
                    if state.left_size == 0 {
                        match state.body_type {
                            HttpBodyType::ContentLength(_) => state.next_step = NextStep::Finished,
                            HttpBodyType::Chunked => state.next_step = NextStep::ChunkEndCr,
                            HttpBodyType::ReadUntilEnd => unreachable!(),
                        }
                    }
                    return Poll::Ready(Ok(()));
                }
                NextStep::ChunkHeader => {
                    loop {
                        let mut reader = Pin::new(&mut *self.reader);
                        let cache = ready!(reader.as_mut().poll_fill_buf(cx))?;
                        if cache.is_empty() {
                            return Poll::Ready(Err(io::Error::new(
                                io::ErrorKind::UnexpectedEof,
                                "reader closed while reading chunk size line",
                            )));
                        }

                        match memchr::memchr(b'\n', cache) {
                            Some(p) => {
                                state.chunk_header.put_slice(&cache[0..=p]);
                                reader.consume(p + 1);
                                state.wire_read += (p + 1) as u64;
                                break;
                            }
                            None => {
                                let len = cache.len();
                                if state.chunk_header.len() + len > state.body_line_max_len {
                                    return Poll::Ready(Err(io::Error::new(
                                        io::ErrorKind::InvalidData,
                                        "chunk size line too long",
                                    )));
                                }
                                state.chunk_header.put_slice(cache);
                                reader.consume(len);
                                state.wire_read += len as u64;
                            }
                        }
                    }

                    let chunk_line = HttpChunkedLine::parse(&state.chunk_header)
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                    state.this_chunk_size = chunk_line.chunk_size;
                    state.left_size = chunk_line.chunk_size;
                    state.chunk_header.clear();
                    state.next_step = if state.left_size == 0 {
                        NextStep::ChunkEndCr
                    } else {
                        NextStep::Data
                    };
                }
                NextStep::ChunkEndCr => {
                    let mut reader = Pin::new(&mut *self.reader);
                    let cache = ready!(reader.as_mut().poll_fill_buf(cx))?;
                    match cache.len() {
                        0 => {
                            return Poll::Ready(Err(io::Error::new(
                                io::ErrorKind::UnexpectedEof,
                                "reader closed while reading chunk end",
                            )));
                        }
                        1 => match cache[0] {
                            b'\r' => {
                                reader.consume(1);
                                state.wire_read += 1;
                                state.next_step = NextStep::ChunkEndLf;
                            }
                            b'\n' => {
                                reader.consume(1);
                                state.wire_read += 1;
                                state.end_of_chunk();
                            }
                            _ => {
                                return Poll::Ready(Err(io::Error::new(
                                    io::ErrorKind::InvalidData,
                                    "invalid chunk ending",
                                )));
                            }
                        },
                        _ => match cache[0] {
                            b'\r' => {
                                if cache[1] != b'\n' {
                                    return Poll::Ready(Err(io::Error::new(
                                        io::ErrorKind::InvalidData,
                                        "invalid chunk ending pair",
                                    )));
                                }
                                reader.consume(2);
                                state.wire_read += 2;
                                state.end_of_chunk();
                            }
                            b'\n' => {
                                reader.consume(1);
                                state.wire_read += 1;
                                state.end_of_chunk();
                            }
                            _ => {
                                return Poll::Ready(Err(io::Error::new(
                                    io::ErrorKind::InvalidData,
                                    "invalid chunk ending",
                                )));
                            }
                        },
                    }
                }
                NextStep::ChunkEndLf => {
                    let mut reader = Pin::new(&mut *self.reader);
                    let cache = ready!(reader.as_mut().poll_fill_buf(cx))?;
                    if cache.is_empty() {
                        return Poll::Ready(Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "reader closed while reading chunk end",
                        )));
                    }
                    if cache[0] != b'\n' {
                        return Poll::Ready(Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            "invalid chunk ending",
                        )));
                    }
                    reader.consume(1);
                    state.wire_read += 1;
                    state.end_of_chunk();
                }
            }
        }
    }
}

impl<R> AsyncRead for HttpBodyDecodeReader<'_, R>
where
    R: AsyncBufRead + Unpin,
{
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let me = &mut *self;

        let old_remaining = buf.remaining();
        match me.poll_decode(cx, buf) {
            Poll::Pending => {
                if old_remaining > buf.remaining() {
                    Poll::Ready(Ok(()))
                } else {
                    Poll::Pending
                }
            }
            Poll::Ready(r) => Poll::Ready(r),
        }
    }
}

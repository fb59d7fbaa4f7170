/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

use tokio::io::{AsyncBufRead, AsyncWrite};

mod fill_wait_data;
mod limited_read_until;
mod write_all_flush;

use fill_wait_data::FillWaitData;
use limited_read_until::LimitedReadUntil;
use write_all_flush::WriteAllFlush;

pub trait LimitedBufReadExt: AsyncBufRead {
    fn limited_read_until<'a>(
        &'a mut self,
        delimiter: u8,
        max_len: usize,
        buf: &'a mut Vec<u8>,
    ) -> LimitedReadUntil<'a, Self>
    where
        Self: Unpin,
    {
        LimitedReadUntil::new(self, delimiter, max_len, buf)
    }

    /// return Poll::Ready(Ok(true)) if some data can be read without blocking
    /// return Poll::Ready(Ok(false)) if read ready but no data can be read
    fn fill_wait_data(&mut self) -> FillWaitData<Self>
    where
        Self: Unpin,
    {
        FillWaitData::new(self)
    }
}

impl<R: AsyncBufRead + ?Sized> LimitedBufReadExt for R {}

pub trait LimitedWriteExt: AsyncWrite {
    fn write_all_flush<'a>(&'a mut self, buf: &'a [u8]) -> WriteAllFlush<'a, Self>
    where
        Self: Unpin,
    {
        WriteAllFlush::new(self, buf)
    }
}

impl<W: AsyncWrite + ?Sized> LimitedWriteExt for W {}

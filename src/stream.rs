//! Per-shard byte streams.
//!
//! A [`ShardStream`] wraps one shard's input together with the [`StreamKind`] of
//! the step that produced it, so readers never check the encoding themselves:
//! [`ShardStream::next_row`] yields rows from binary frames and from
//! tab-separated lines alike.
//!
//! Streams handed to driver-side output handlers also carry a [`CancelToken`].
//! Once the output aggregator cancels, the next read fails with
//! [`Error::Cancelled`].

use crate::error::{Error, Result};
use crate::row::{Row, decode_row, encode_row, now, parse_tsv_line, read_frame};
use crate::step::StreamKind;
use crate::value::Value;
use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag for a group of shard tasks.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One shard's readable stream.
pub struct ShardStream<'a> {
    shard: usize,
    kind: StreamKind,
    reader: Box<dyn BufRead + Send + 'a>,
    cancel: Option<CancelToken>,
}

impl<'a> ShardStream<'a> {
    pub fn new(shard: usize, kind: StreamKind, reader: impl BufRead + Send + 'a) -> Self {
        Self {
            shard,
            kind,
            reader: Box::new(reader),
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn shard(&self) -> usize {
        self.shard
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn is_raw(&self) -> bool {
        self.kind == StreamKind::RawBytes
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(Error::Cancelled { shard: self.shard }),
            _ => Ok(()),
        }
    }

    /// Next raw line exactly as read, terminator included.
    pub fn next_raw_line(&mut self) -> Result<Option<Vec<u8>>> {
        self.check_cancelled()?;
        let mut line = Vec::new();
        if self.reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }

    /// Next non-blank raw line, terminator included.
    pub fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        while let Some(line) = self.next_raw_line()? {
            if line.iter().any(|&b| b != b'\n' && b != b'\r') {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }

    /// Next record as fields. Raw lines are split on tabs.
    pub fn next_fields(&mut self) -> Result<Option<Vec<Value>>> {
        match self.kind {
            StreamKind::RawBytes => Ok(self.next_line()?.map(|line| parse_tsv_line(&line))),
            StreamKind::StructuredRows => Ok(self.next_row()?.map(|row| row.fields().cloned().collect())),
        }
    }

    /// Next encoded row payload. Raw lines are converted into rows first.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>> {
        match self.kind {
            StreamKind::StructuredRows => {
                self.check_cancelled()?;
                read_frame(&mut self.reader)
            }
            StreamKind::RawBytes => match self.next_line()? {
                Some(line) => Ok(Some(encode_row(&Row::new(now(), parse_tsv_line(&line)))?)),
                None => Ok(None),
            },
        }
    }

    /// Next decoded row. A raw line's first field becomes the key, the rest values.
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        match self.kind {
            StreamKind::StructuredRows => {
                self.check_cancelled()?;
                read_frame(&mut self.reader)?.map(|f| decode_row(&f)).transpose()
            }
            StreamKind::RawBytes => Ok(self
                .next_line()?
                .map(|line| Row::new(now(), parse_tsv_line(&line)))),
        }
    }

    /// Feed up to `limit` rows (all of them for `None`) to `f`.
    pub fn take_rows<F>(&mut self, limit: Option<usize>, mut f: F) -> anyhow::Result<()>
    where
        F: FnMut(Row) -> anyhow::Result<()>,
    {
        let mut taken = 0;
        while limit.is_none_or(|l| taken < l) {
            let Some(row) = self.next_row()? else { break };
            f(row)?;
            taken += 1;
        }
        Ok(())
    }
}

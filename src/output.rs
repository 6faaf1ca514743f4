//! Driver-side output collection.
//!
//! [`Dataset::output`] attaches a terminal step that, when run, drains every shard
//! of the dataset through a handler on its own thread. Completions come back over
//! a channel bounded to the shard count and are judged in shard order:
//!
//! - the first failure to arrive cancels the other shards' streams, so handlers
//!   still reading see [`Error::Cancelled`] on their next read
//! - every task is drained before the step returns; nothing is left running
//! - the reported failure is the lowest-indexed one that is not a cancellation
//!
//! The helpers below (`pipe_out`, `fprintf`, `save_first_row_to`, `output_row`)
//! are all handlers over this one primitive.

use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::format::Template;
use crate::instruction::{Instruction, OutputFn};
use crate::row::{Row, write_tsv_row};
use crate::stream::{CancelToken, ShardStream};
use crate::value::SlotSet;
use crossbeam_channel::{Receiver, bounded};
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use tracing::{debug, error};

/// Per-shard buffers are handed to a shared writer once they grow past this size.
pub const FLUSH_THRESHOLD: usize = 64 * 1024;

type Completion = (usize, anyhow::Result<()>);

fn is_cancellation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<Error>().is_some_and(Error::is_cancellation)
}

/// Run `handler` over every stream concurrently and aggregate the outcomes.
pub(crate) fn drain_shards(inputs: Vec<ShardStream<'_>>, handler: &OutputFn) -> Result<()> {
    let n = inputs.len();
    if n == 0 {
        return Ok(());
    }
    let cancel = CancelToken::new();
    let (tx, rx) = bounded::<Completion>(n);
    thread::scope(|scope| {
        for (index, stream) in inputs.into_iter().enumerate() {
            let tx = tx.clone();
            let stream = stream.with_cancel(cancel.clone());
            scope.spawn(move || {
                let result = handler(stream);
                // Capacity equals the task count, so this never blocks.
                let _ = tx.send((index, result));
            });
        }
        drop(tx);
        aggregate(n, &rx, &cancel)
    })
}

fn aggregate(n: usize, rx: &Receiver<Completion>, cancel: &CancelToken) -> Result<()> {
    let mut results: Vec<Option<anyhow::Result<()>>> = (0..n).map(|_| None).collect();
    let mut failure: Option<Error> = None;
    for next in 0..n {
        while results[next].is_none() {
            // Disconnected means a handler panicked; the scope re-raises it.
            let Ok((index, result)) = rx.recv() else {
                return failure.map_or(Ok(()), Err);
            };
            if let Err(e) = &result
                && !is_cancellation(e)
                && !cancel.is_cancelled()
            {
                debug!(shard = index, "output handler failed, cancelling remaining shards");
                cancel.cancel();
            }
            results[index] = Some(result);
        }
        if let Some(Err(e)) = results[next].take()
            && failure.is_none()
            && !is_cancellation(&e)
        {
            error!(shard = next, error = %e, "failed to process output");
            failure = Some(Error::handler_failure(next, e));
        }
    }
    failure.map_or(Ok(()), Err)
}

/// A writer shared by every shard task of one output step.
struct SharedWriter<W> {
    inner: Arc<Mutex<W>>,
}

impl<W> Clone for SharedWriter<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: Write> SharedWriter<W> {
    fn new(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    fn buffer(&self) -> ShardBuffer<'_, W> {
        ShardBuffer {
            shared: &self.inner,
            buf: Vec::new(),
        }
    }
}

/// Collects one shard's output and hands it over only at record boundaries, so
/// records from different shards never interleave mid-line.
struct ShardBuffer<'s, W: Write> {
    shared: &'s Mutex<W>,
    buf: Vec<u8>,
}

impl<W: Write> ShardBuffer<'_, W> {
    fn end_record(&mut self) -> Result<()> {
        if self.buf.len() >= FLUSH_THRESHOLD {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let mut w = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        w.write_all(&self.buf)?;
        w.flush()?;
        self.buf.clear();
        Ok(())
    }
}

impl Dataset {
    /// Attach a driver-side step that drains every shard through `f` concurrently.
    ///
    /// Returns `self`; the output step produces no dataset.
    pub fn output<F>(&self, f: F) -> Result<Dataset>
    where
        F: Fn(ShardStream<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handler: OutputFn = Arc::new(f);
        self.flow
            .add_all_to_one_step("Output", self, None, Instruction::Output(handler))?;
        Ok(self.clone())
    }

    /// Write every shard to `writer`.
    ///
    /// Raw pipe output is copied as is; structured rows are written one per line
    /// with tab-separated fields.
    pub fn pipe_out<W>(&self, writer: W) -> Result<Dataset>
    where
        W: Write + Send + 'static,
    {
        let shared = SharedWriter::new(writer);
        self.output(move |mut stream| {
            let mut out = shared.buffer();
            if stream.is_raw() {
                while let Some(line) = stream.next_raw_line()? {
                    out.buf.extend_from_slice(&line);
                    out.end_record()?;
                }
            } else {
                while let Some(row) = stream.next_row()? {
                    write_tsv_row(&mut out.buf, &row)?;
                    out.end_record()?;
                }
            }
            out.flush()?;
            Ok(())
        })
    }

    /// Write each row to `writer` through the format `template`.
    ///
    /// # Errors
    /// The template is parsed here, so a bad template fails before anything runs.
    pub fn fprintf<W>(&self, writer: W, template: &str) -> Result<Dataset>
    where
        W: Write + Send + 'static,
    {
        let template = Template::parse(template)?;
        let shared = SharedWriter::new(writer);
        self.output(move |mut stream| {
            let mut out = shared.buffer();
            let mut line = String::new();
            while let Some(fields) = stream.next_fields()? {
                line.clear();
                template.render_into(&mut line, &fields)?;
                out.buf.extend_from_slice(line.as_bytes());
                out.end_record()?;
            }
            out.flush()?;
            Ok(())
        })
    }

    /// [`fprintf`](Self::fprintf) with a newline appended to the template.
    pub fn fprintlnf<W>(&self, writer: W, template: &str) -> Result<Dataset>
    where
        W: Write + Send + 'static,
    {
        self.fprintf(writer, &format!("{template}\n"))
    }

    /// [`fprintf`](Self::fprintf) to standard output.
    pub fn printf(&self, template: &str) -> Result<Dataset> {
        self.fprintf(std::io::stdout(), template)
    }

    /// [`fprintlnf`](Self::fprintlnf) to standard output.
    pub fn printlnf(&self, template: &str) -> Result<Dataset> {
        self.fprintlnf(std::io::stdout(), template)
    }

    /// Coerce the first row's key fields, then value fields, into `slots`.
    ///
    /// Each shard offers its first row; the first one to arrive is kept. Raw pipe
    /// lines provide text fields, or bytes where a field is not valid UTF-8.
    pub fn save_first_row_to(&self, slots: &SlotSet) -> Result<Dataset> {
        let slots = slots.clone();
        self.output(move |mut stream| {
            if let Some(fields) = stream.next_fields()? {
                slots.fill(&fields)?;
            }
            Ok(())
        })
    }

    /// Hand every row to `f`. Raw pipe lines become rows keyed by their first field.
    pub fn output_row<F>(&self, f: F) -> Result<Dataset>
    where
        F: Fn(&Row) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.output(move |mut stream| stream.take_rows(None, |row| f(&row)))
    }
}

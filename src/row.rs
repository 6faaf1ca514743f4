//! Row codec: binary frames and tab-separated text.
//!
//! A structured shard stream is a sequence of frames. Each frame is a 4-byte
//! big-endian payload length followed by the `postcard` encoding of one [`Row`]:
//! its key fields, its value fields, then its timestamp. `postcard` stores every
//! [`Value`] with its variant tag, so fields are self-describing and decode back
//! into exactly the kinds they were written with.
//!
//! Raw pipe streams carry tab-separated text instead: one record per line,
//! fields joined by `\t`. [`parse_tsv_line`] and [`write_tsv_row`] convert between
//! the two worlds.

use crate::error::{Error, Result};
use crate::value::Value;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since UNIX epoch (UTC).
pub type TimestampMs = i64;

/// Frames larger than this are treated as corrupt rather than allocated.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// One logical record: ordered key fields, ordered value fields and a creation time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub k: Vec<Value>,
    pub v: Vec<Value>,
    pub t: TimestampMs,
}

impl Row {
    /// Build a row whose first field is the key and the rest are values.
    pub fn new(t: TimestampMs, fields: impl IntoIterator<Item = Value>) -> Self {
        let mut fields = fields.into_iter();
        let k = fields.next().into_iter().collect();
        Self {
            k,
            v: fields.collect(),
            t,
        }
    }

    pub fn from_kv(k: Vec<Value>, v: Vec<Value>) -> Self {
        Self { k, v, t: now() }
    }

    pub fn width(&self) -> usize {
        self.k.len() + self.v.len()
    }

    /// Key fields followed by value fields.
    pub fn fields(&self) -> impl Iterator<Item = &Value> {
        self.k.iter().chain(self.v.iter())
    }

    /// Resolve a 1-based index against the key fields followed by the value fields.
    pub fn field(&self, index: usize) -> Result<&Value> {
        if index == 0 {
            return Err(Error::InvalidKeyIndex);
        }
        self.fields()
            .nth(index - 1)
            .ok_or(Error::KeyIndexOutOfRange {
                index,
                fields: self.width(),
            })
    }
}

/// Current wall-clock time in milliseconds.
pub fn now() -> TimestampMs {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as TimestampMs)
        .unwrap_or_default()
}

/// Encode a row into its binary payload (no length prefix).
pub fn encode_row(row: &Row) -> Result<Vec<u8>> {
    postcard::to_allocvec(row).map_err(|e| Error::malformed(format!("encode: {e}")))
}

/// Decode a binary payload produced by [`encode_row`].
///
/// # Errors
/// Returns [`Error::MalformedRow`] on truncated input, unknown tags, or trailing bytes.
pub fn decode_row(bytes: &[u8]) -> Result<Row> {
    let (row, rest) = postcard::take_from_bytes::<Row>(bytes)
        .map_err(|e| Error::malformed(format!("decode: {e}")))?;
    if !rest.is_empty() {
        return Err(Error::malformed(format!(
            "{} trailing byte(s) after row",
            rest.len()
        )));
    }
    Ok(row)
}

/// Write one length-prefixed frame.
pub fn write_frame(w: &mut (impl Write + ?Sized), payload: &[u8]) -> Result<()> {
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|&n| n as usize <= MAX_FRAME_LEN)
        .ok_or_else(|| Error::malformed(format!("frame of {} bytes is too large", payload.len())))?;
    w.write_all(&len.to_be_bytes())?;
    w.write_all(payload)?;
    Ok(())
}

/// Encode `row` and write it as one frame.
pub fn write_row(w: &mut (impl Write + ?Sized), row: &Row) -> Result<()> {
    write_frame(w, &encode_row(row)?)
}

/// Read one length-prefixed frame. Returns `Ok(None)` on a clean end of stream.
///
/// # Errors
/// A stream that ends inside a header or payload is [`Error::MalformedRow`].
pub fn read_frame(r: &mut (impl Read + ?Sized)) -> Result<Option<Vec<u8>>> {
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        match r.read(&mut header[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(Error::malformed("stream ends inside a frame header")),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(Error::malformed(format!("frame length {len} exceeds limit")));
    }
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => Error::malformed(format!("stream ends inside a {len} byte frame")),
        _ => e.into(),
    })?;
    Ok(Some(payload))
}

/// Parse one tab-separated line into fields. A trailing `\n` or `\r\n` is ignored.
///
/// Fields are text when they are valid UTF-8 and bytes otherwise, so nothing an
/// external process emits is lost.
pub fn parse_tsv_line(line: &[u8]) -> Vec<Value> {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    line.split(|&b| b == b'\t')
        .map(|field| match String::from_utf8(field.to_vec()) {
            Ok(text) => Value::Text(text),
            Err(e) => Value::Bytes(e.into_bytes()),
        })
        .collect()
}

/// Write `row` as one tab-separated line: key fields, then value fields.
pub fn write_tsv_row(w: &mut (impl Write + ?Sized), row: &Row) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(QuoteStyle::Never)
        .terminator(Terminator::Any(b'\n'))
        .flexible(true)
        .has_headers(false)
        .from_writer(w);
    // Bytes fields are written as is so raw pipe input survives a round trip.
    let fields = row.fields().map(|f| match f {
        Value::Bytes(b) => b.clone(),
        other => other.to_string().into_bytes(),
    });
    wtr.write_record(fields).map_err(|e| Error::Io(e.into()))?;
    wtr.flush()?;
    Ok(())
}

//! Dynamic field values and coercion into typed scalar slots.
//!
//! A [`Row`](crate::row::Row) carries its fields as [`Value`]s, a closed set of
//! scalar kinds. Callers that want plain Rust scalars back hand over a [`Slot`]
//! (a typed mutable destination) and [`coerce`] fills it:
//!
//! - integers convert into any integer width when the value fits, and into floats
//! - floats convert into floats when the destination width can hold them, and into
//!   integers only when finite, integral and in range
//! - text converts into bytes; bytes convert into text when they are valid UTF-8
//! - booleans only convert into booleans
//!
//! Every other pair fails with [`Error::TypeMismatch`]; nothing silently defaults.
//!
//! ```
//! use shardflow::value::{coerce, Slot, Value};
//!
//! let mut n: u8 = 0;
//! coerce(&Value::I64(200), Slot::U8(&mut n)).unwrap();
//! assert_eq!(n, 200);
//!
//! let mut flag = false;
//! assert!(coerce(&Value::Text("true".into()), Slot::Bool(&mut flag)).is_err());
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// A dynamically typed field value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Text(String),
    Bytes(Vec<u8>),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Bool(bool),
    F32(f32),
    F64(f64),
}

/// The kind tag of a [`Value`] or a [`Slot`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Text,
    Bytes,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    Bool,
    F32,
    F64,
}

impl Value {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Value::Text(_) => ScalarKind::Text,
            Value::Bytes(_) => ScalarKind::Bytes,
            Value::I8(_) => ScalarKind::I8,
            Value::I16(_) => ScalarKind::I16,
            Value::I32(_) => ScalarKind::I32,
            Value::I64(_) => ScalarKind::I64,
            Value::U8(_) => ScalarKind::U8,
            Value::U16(_) => ScalarKind::U16,
            Value::U32(_) => ScalarKind::U32,
            Value::U64(_) => ScalarKind::U64,
            Value::Bool(_) => ScalarKind::Bool,
            Value::F32(_) => ScalarKind::F32,
            Value::F64(_) => ScalarKind::F64,
        }
    }

    /// The zero value of `kind`, used to pre-fill slot sets.
    pub fn zero(kind: ScalarKind) -> Self {
        match kind {
            ScalarKind::Text => Value::Text(String::new()),
            ScalarKind::Bytes => Value::Bytes(Vec::new()),
            ScalarKind::I8 => Value::I8(0),
            ScalarKind::I16 => Value::I16(0),
            ScalarKind::I32 => Value::I32(0),
            ScalarKind::I64 => Value::I64(0),
            ScalarKind::U8 => Value::U8(0),
            ScalarKind::U16 => Value::U16(0),
            ScalarKind::U32 => Value::U32(0),
            ScalarKind::U64 => Value::U64(0),
            ScalarKind::Bool => Value::Bool(false),
            ScalarKind::F32 => Value::F32(0.0),
            ScalarKind::F64 => Value::F64(0.0),
        }
    }

    /// Borrow this value as a destination slot of its own kind.
    pub fn as_slot(&mut self) -> Slot<'_> {
        match self {
            Value::Text(v) => Slot::Text(v),
            Value::Bytes(v) => Slot::Bytes(v),
            Value::I8(v) => Slot::I8(v),
            Value::I16(v) => Slot::I16(v),
            Value::I32(v) => Slot::I32(v),
            Value::I64(v) => Slot::I64(v),
            Value::U8(v) => Slot::U8(v),
            Value::U16(v) => Slot::U16(v),
            Value::U32(v) => Slot::U32(v),
            Value::U64(v) => Slot::U64(v),
            Value::Bool(v) => Slot::Bool(v),
            Value::F32(v) => Slot::F32(v),
            Value::F64(v) => Slot::F64(v),
        }
    }

    fn as_integer(&self) -> Option<i128> {
        match *self {
            Value::I8(v) => Some(v.into()),
            Value::I16(v) => Some(v.into()),
            Value::I32(v) => Some(v.into()),
            Value::I64(v) => Some(v.into()),
            Value::U8(v) => Some(v.into()),
            Value::U16(v) => Some(v.into()),
            Value::U32(v) => Some(v.into()),
            Value::U64(v) => Some(v.into()),
            _ => None,
        }
    }

    fn as_float(&self) -> Option<f64> {
        match *self {
            Value::F32(v) => Some(v.into()),
            Value::F64(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(v) => f.write_str(v),
            Value::Bytes(v) => f.write_str(&String::from_utf8_lossy(v)),
            Value::I8(v) => write!(f, "{v}"),
            Value::I16(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "{v}"),
            Value::U16(v) => write!(f, "{v}"),
            Value::U32(v) => write!(f, "{v}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::F32(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

macro_rules! value_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::$variant(v)
            }
        })*
    };
}

value_from!(
    String => Text,
    Vec<u8> => Bytes,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    bool => Bool,
    f32 => F32,
    f64 => F64,
);

/// A typed, caller-owned destination for one coerced field.
#[derive(Debug)]
pub enum Slot<'a> {
    Text(&'a mut String),
    Bytes(&'a mut Vec<u8>),
    I8(&'a mut i8),
    I16(&'a mut i16),
    I32(&'a mut i32),
    I64(&'a mut i64),
    U8(&'a mut u8),
    U16(&'a mut u16),
    U32(&'a mut u32),
    U64(&'a mut u64),
    Bool(&'a mut bool),
    F32(&'a mut f32),
    F64(&'a mut f64),
}

impl Slot<'_> {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Slot::Text(_) => ScalarKind::Text,
            Slot::Bytes(_) => ScalarKind::Bytes,
            Slot::I8(_) => ScalarKind::I8,
            Slot::I16(_) => ScalarKind::I16,
            Slot::I32(_) => ScalarKind::I32,
            Slot::I64(_) => ScalarKind::I64,
            Slot::U8(_) => ScalarKind::U8,
            Slot::U16(_) => ScalarKind::U16,
            Slot::U32(_) => ScalarKind::U32,
            Slot::U64(_) => ScalarKind::U64,
            Slot::Bool(_) => ScalarKind::Bool,
            Slot::F32(_) => ScalarKind::F32,
            Slot::F64(_) => ScalarKind::F64,
        }
    }
}

fn integer_from(value: &Value) -> Option<i128> {
    if let Some(i) = value.as_integer() {
        return Some(i);
    }
    let f = value.as_float()?;
    // i128 covers every integer slot, so the range check happens in try_from below.
    (f.is_finite() && f.fract() == 0.0 && f.abs() < 1e38).then_some(f as i128)
}

/// Convert `value` into the kind requested by `slot` and store it there.
///
/// # Errors
/// Returns [`Error::TypeMismatch`] when the pair of kinds is not convertible or the
/// value does not fit the destination width. The slot is left untouched on error.
pub fn coerce(value: &Value, slot: Slot<'_>) -> Result<()> {
    let (from, to) = (value.kind(), slot.kind());
    let mismatch = || Error::TypeMismatch { from, to };

    macro_rules! integer {
        ($dst:expr) => {{
            let i = integer_from(value).ok_or_else(mismatch)?;
            *$dst = i.try_into().map_err(|_| mismatch())?;
        }};
    }

    macro_rules! float {
        ($dst:expr, $t:ty) => {{
            let f = match value.as_integer() {
                Some(i) => i as f64,
                None => value.as_float().ok_or_else(mismatch)?,
            };
            let narrowed = f as $t;
            // Finite values must stay finite; inf and NaN pass through unchanged.
            if f.is_finite() && !narrowed.is_finite() {
                return Err(mismatch());
            }
            *$dst = narrowed;
        }};
    }

    match slot {
        Slot::Text(dst) => match value {
            Value::Text(s) => dst.clone_from(s),
            Value::Bytes(b) => *dst = String::from_utf8(b.clone()).map_err(|_| mismatch())?,
            _ => return Err(mismatch()),
        },
        Slot::Bytes(dst) => match value {
            Value::Bytes(b) => dst.clone_from(b),
            Value::Text(s) => *dst = s.as_bytes().to_vec(),
            _ => return Err(mismatch()),
        },
        Slot::Bool(dst) => match value {
            Value::Bool(b) => *dst = *b,
            _ => return Err(mismatch()),
        },
        Slot::I8(dst) => integer!(dst),
        Slot::I16(dst) => integer!(dst),
        Slot::I32(dst) => integer!(dst),
        Slot::I64(dst) => integer!(dst),
        Slot::U8(dst) => integer!(dst),
        Slot::U16(dst) => integer!(dst),
        Slot::U32(dst) => integer!(dst),
        Slot::U64(dst) => integer!(dst),
        Slot::F32(dst) => float!(dst, f32),
        Slot::F64(dst) => float!(dst, f64),
    }
    Ok(())
}

/// A shared, thread-safe set of typed slots filled by a driver-side output step.
///
/// Output steps run after the graph is built, so they cannot borrow caller locals.
/// `SlotSet` is cloned into the step and read back once the flow has run.
///
/// ```
/// use shardflow::value::{ScalarKind, SlotSet, Value};
///
/// let slots = SlotSet::new([ScalarKind::I32, ScalarKind::Text]);
/// slots.fill(&[Value::I64(7), Value::from("seven")]).unwrap();
/// assert_eq!(slots.get(0), Some(Value::I32(7)));
/// ```
#[derive(Clone, Debug)]
pub struct SlotSet {
    inner: Arc<Mutex<SlotSetInner>>,
}

#[derive(Debug)]
struct SlotSetInner {
    values: Vec<Value>,
    filled: bool,
    assigned: usize,
}

impl SlotSet {
    pub fn new(kinds: impl IntoIterator<Item = ScalarKind>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SlotSetInner {
                values: kinds.into_iter().map(Value::zero).collect(),
                filled: false,
                assigned: 0,
            })),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a row has already been stored.
    pub fn is_filled(&self) -> bool {
        self.lock().filled
    }

    /// Number of leading slots the stored row provided a field for.
    ///
    /// A row narrower than the set leaves the remaining slots at their zero value;
    /// this tells a stored zero apart from a slot the row never reached.
    pub fn assigned(&self) -> usize {
        self.lock().assigned
    }

    /// Whether slot `index` holds a field from the stored row.
    pub fn is_assigned(&self, index: usize) -> bool {
        index < self.assigned()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.lock().values.get(index).cloned()
    }

    pub fn values(&self) -> Vec<Value> {
        self.lock().values.clone()
    }

    /// Coerce `fields` into the slots in order. Fields beyond the slot count are ignored;
    /// slots beyond the field count keep their zero value and are not
    /// [assigned](Self::is_assigned), but the set still counts as filled.
    ///
    /// Only the first successful fill is kept; later calls are no-ops. All fields are
    /// coerced before any slot is written, so a failed fill leaves the set unchanged.
    ///
    /// # Errors
    /// Returns [`Error::TypeMismatch`] for the first field that does not fit its slot.
    pub fn fill(&self, fields: &[Value]) -> Result<()> {
        let mut inner = self.lock();
        if inner.filled {
            return Ok(());
        }
        let mut staged = inner.values.clone();
        for (slot, field) in staged.iter_mut().zip(fields) {
            coerce(field, slot.as_slot())?;
        }
        inner.values = staged;
        inner.filled = true;
        inner.assigned = fields.len().min(inner.values.len());
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SlotSetInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

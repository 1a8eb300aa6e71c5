use log::trace;

use crate::{
    callback::{Callback, Context, Next, Step},
    error::{ErrorSource, SyntaxError},
};

/// Target width of a [`Varint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    U32,
    U64,
}

impl Width {
    /// Longest valid encoding, in bytes.
    #[must_use]
    pub const fn max_len(self) -> usize {
        match self {
            Width::U32 => 5,
            Width::U64 => 10,
        }
    }

    const fn bits(self) -> u32 {
        match self {
            Width::U32 => 32,
            Width::U64 => 64,
        }
    }
}

/// Longest varint encoding of a `u64`.
pub const MAX_LEN: usize = Width::U64.max_len();

/// Number of bytes `value` takes as a varint.
#[must_use]
pub const fn encoded_len(value: u64) -> usize {
    let bits = (u64::BITS - (value | 1).leading_zeros()) as usize;
    bits.div_ceil(7)
}

/// Writes `value` in base-128 form into `buf` and returns the encoded
/// prefix.
///
/// ```rust
/// use pushparse::protobuf::varint;
///
/// let mut buf = [0; varint::MAX_LEN];
/// assert_eq!(varint::encode(300, &mut buf), &[0xac, 0x02]);
/// assert_eq!(varint::encoded_len(300), 2);
/// ```
#[allow(clippy::cast_possible_truncation)]
pub fn encode(mut value: u64, buf: &mut [u8; MAX_LEN]) -> &[u8] {
    let mut len = 0;
    while value >= 0x80 {
        buf[len] = value as u8 | 0x80;
        value >>= 7;
        len += 1;
    }
    buf[len] = value as u8;
    &buf[..=len]
}

/// Incremental base-128 varint decoder.
///
/// The decoded value goes to the sink and is also handed off to the
/// successor, so a varint can feed a length into the callback after it.
pub struct Varint<F> {
    width: Width,
    value: u64,
    shift: u32,
    read: usize,
    allow_eof: bool,
    sink: F,
    next: Next,
}

/// Sink for varints whose value is only handed off.
pub(crate) fn discard<T>(_: &mut T, _: u64) -> Result<(), SyntaxError> {
    Ok(())
}

impl<F> Varint<F> {
    pub fn new(width: Width, sink: F) -> Self {
        Self {
            width,
            value: 0,
            shift: 0,
            read: 0,
            allow_eof: false,
            sink,
            next: Next::Finish,
        }
    }

    #[must_use]
    pub fn then(mut self, next: impl Into<Next>) -> Self {
        self.next = next.into();
        self
    }

    /// Accept the stream ending before the first byte of the value.
    #[must_use]
    pub fn allow_eof(mut self, allow: bool) -> Self {
        self.allow_eof = allow;
        self
    }

    fn reset(&mut self) {
        self.value = 0;
        self.shift = 0;
        self.read = 0;
    }

    /// Folds one byte in. Returns `true` on the final byte.
    fn accumulate(&mut self, byte: u8) -> Result<bool, SyntaxError> {
        let max_len = self.width.max_len();
        if self.read == max_len {
            return Err(SyntaxError::VarintTooLong(max_len));
        }
        let part = u64::from(byte & 0x7f);
        let room = self.width.bits() - self.shift;
        if room < 7 && part >> room != 0 {
            return Err(SyntaxError::VarintOverflow(self.width.bits()));
        }
        self.value |= part << self.shift;
        self.shift += 7;
        self.read += 1;

        let last = byte & 0x80 == 0;
        if !last && self.read == max_len {
            return Err(SyntaxError::VarintTooLong(max_len));
        }
        Ok(last)
    }

    /// Delivers the value; `read` is how much of the current chunk it took.
    fn complete<T>(&mut self, cx: &mut Context<'_, T>, read: usize) -> Result<(), ErrorSource>
    where
        F: FnMut(&mut T, u64) -> Result<(), SyntaxError>,
    {
        let value = self.value;
        trace!("varint: read {value} using {} bytes", self.read);
        self.reset();
        if let Err(err) = (self.sink)(cx.output(), value) {
            cx.advance(read);
            return Err(err.into());
        }
        cx.hand_off(value);
        cx.continue_with(self.next);
        Ok(())
    }
}

impl<T, F> Callback<T> for Varint<F>
where
    F: FnMut(&mut T, u64) -> Result<(), SyntaxError>,
{
    fn activate(&mut self, _cx: &mut Context<'_, T>, _input: Option<u64>) -> Result<(), ErrorSource> {
        self.reset();
        Ok(())
    }

    fn process(&mut self, cx: &mut Context<'_, T>, buf: &[u8]) -> Result<Step, ErrorSource> {
        // Single-byte values are by far the most common.
        if self.read == 0 {
            if let Some(&byte) = buf.first() {
                if byte < 0x80 {
                    self.value = u64::from(byte);
                    self.read = 1;
                    self.complete(cx, 1)?;
                    return Ok(Step::Done {
                        unconsumed: buf.len() - 1,
                    });
                }
            }
        }

        for (index, &byte) in buf.iter().enumerate() {
            let last = match self.accumulate(byte) {
                Ok(last) => last,
                Err(err) => {
                    // The rejected byte is not counted as read.
                    cx.advance(index);
                    return Err(err.into());
                }
            };
            if last {
                self.complete(cx, index + 1)?;
                return Ok(Step::Done {
                    unconsumed: buf.len() - index - 1,
                });
            }
        }
        trace!("varint: {} bytes so far", self.read);
        Ok(Step::Incomplete)
    }

    fn close(&mut self, _cx: &mut Context<'_, T>) -> Result<(), ErrorSource> {
        if self.read == 0 && self.allow_eof {
            return Ok(());
        }
        Err(SyntaxError::UnexpectedEndOfInput.into())
    }
}

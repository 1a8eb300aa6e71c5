use crate::{
    callback::{Callback, Context, Next, Step},
    error::{ErrorSource, SyntaxError},
};

/// Reads exactly `width` bytes from a single chunk and passes them to a
/// sink. Wrap it in [`MinBytes`](super::MinBytes) so the chunk is always
/// long enough; on its own a short chunk is [`SyntaxError::ShortRead`].
pub struct Fixed<F> {
    width: usize,
    sink: F,
    next: Next,
}

impl<F> Fixed<F> {
    pub fn new(width: usize, sink: F) -> Self {
        Self {
            width,
            sink,
            next: Next::Finish,
        }
    }

    #[must_use]
    pub fn then(mut self, next: impl Into<Next>) -> Self {
        self.next = next.into();
        self
    }
}

impl<T, F> Callback<T> for Fixed<F>
where
    F: FnMut(&mut T, &[u8]) -> Result<(), SyntaxError>,
{
    fn process(&mut self, cx: &mut Context<'_, T>, buf: &[u8]) -> Result<Step, ErrorSource> {
        let Some(value) = buf.get(..self.width) else {
            if buf.is_empty() && self.width > 0 {
                return Ok(Step::Incomplete);
            }
            return Err(SyntaxError::ShortRead {
                needed: self.width,
                available: buf.len(),
            }
            .into());
        };
        if let Err(err) = (self.sink)(cx.output(), value) {
            cx.advance(self.width);
            return Err(err.into());
        }
        cx.continue_with(self.next);
        Ok(Step::Done {
            unconsumed: buf.len() - self.width,
        })
    }
}

pub(crate) fn le_u32(bytes: &[u8]) -> u32 {
    let mut word = [0; 4];
    word.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(word)
}

pub(crate) fn le_u64(bytes: &[u8]) -> u64 {
    let mut word = [0; 8];
    word.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(word)
}

use alloc::vec::Vec;

/// Split `payload` into `parts` approximately equal-sized chunks.
///
/// # Panics
///
/// Panics if `parts` is zero.
#[must_use]
pub fn produce_chunks(payload: &[u8], parts: usize) -> Vec<&[u8]> {
    assert!(parts > 0);
    let chunk_size = payload.len().div_ceil(parts).max(1);
    payload.chunks(chunk_size).collect()
}

/// Split `payload` into chunks whose sizes are derived from arbitrary
/// `splits`, the way a property test or fuzzer would.
///
/// Every chunk is non-empty and the chunks concatenate back to `payload`.
#[must_use]
pub fn split_by<'a>(payload: &'a [u8], splits: &[usize]) -> Vec<&'a [u8]> {
    let mut chunks = Vec::new();
    let mut rest = payload;
    for split in splits {
        if rest.is_empty() {
            break;
        }
        let (chunk, tail) = rest.split_at(1 + split % rest.len());
        chunks.push(chunk);
        rest = tail;
    }
    if !rest.is_empty() {
        chunks.push(rest);
    }
    chunks
}

/// Every chunk of `payload` is a single byte.
#[must_use]
pub fn bytewise(payload: &[u8]) -> Vec<&[u8]> {
    payload.chunks(1).collect()
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    #[test]
    fn split_by_chunks_outlive_the_splits() {
        let payload = b"abcdef";
        let chunks = {
            let splits = vec![0, 1, 7];
            split_by(payload, &splits)
        };
        assert_eq!(chunks, [&b"a"[..], &b"bc"[..], &b"de"[..], &b"f"[..]]);
        assert_eq!(split_by(b"", &[3]), Vec::<&[u8]>::new());
    }
}

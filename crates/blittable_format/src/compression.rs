//! LZ4 block compression for long strings.

use crate::error::{BlittableError, BlittableResult};

/// LZ4 block codec.
///
/// Stateless; one instance lives in each [`crate::DocumentContext`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Codec;

impl Lz4Codec {
    /// Creates a codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Returns the worst-case compressed size of `len` input bytes.
    #[must_use]
    pub fn max_compressed_len(&self, len: usize) -> usize {
        lz4_flex::block::get_maximum_output_size(len)
    }

    /// Compresses `src` into `dst`, returning the compressed length.
    ///
    /// # Errors
    ///
    /// Returns [`BlittableError::InvalidOperation`] if `dst` is smaller than
    /// [`Lz4Codec::max_compressed_len`] requires.
    pub fn compress_into(&self, src: &[u8], dst: &mut [u8]) -> BlittableResult<usize> {
        lz4_flex::block::compress_into(src, dst)
            .map_err(|e| BlittableError::invalid_operation(format!("LZ4 compression failed: {e}")))
    }

    /// Decompresses `src` into `dst`, which must be exactly the recorded
    /// uncompressed length.
    ///
    /// # Errors
    ///
    /// Returns [`BlittableError::DecompressedSizeMismatch`] if the payload
    /// decodes to fewer bytes than `dst` holds, and
    /// [`BlittableError::InvalidFormat`] if it is corrupt or decodes to more.
    pub fn decompress_into(&self, src: &[u8], dst: &mut [u8]) -> BlittableResult<usize> {
        let actual = lz4_flex::block::decompress_into(src, dst)
            .map_err(|e| BlittableError::invalid_format(format!("corrupt LZ4 payload: {e}")))?;
        if actual != dst.len() {
            return Err(BlittableError::DecompressedSizeMismatch {
                expected: dst.len(),
                actual,
            });
        }
        Ok(actual)
    }

    /// Decompresses `src` into a new vector of `expected_len` bytes.
    ///
    /// # Errors
    ///
    /// Same as [`Lz4Codec::decompress_into`].
    pub fn decompress(&self, src: &[u8], expected_len: usize) -> BlittableResult<Vec<u8>> {
        let mut out = vec![0u8; expected_len];
        self.decompress_into(src, &mut out)?;
        Ok(out)
    }
}

/// Returns true if the compressed form saves more than 10%.
#[must_use]
pub fn worth_compressing(original_len: usize, compressed_len: usize) -> bool {
    compressed_len.saturating_mul(10) < original_len.saturating_mul(9)
}

//! Identity codec: returns its input unchanged.
//!
//! Useful as a reference oracle in tests and as the `null` algorithm of the
//! container format.

use crate::{Codec, Result};

/// Codec that performs no transformation at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCodec;

impl Codec for NullCodec {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

//! Little-endian cursor over an account payload
//!
//! Every read is bounds-checked and reports `DecodeError::Truncated` instead
//! of panicking, so a malformed payload can never take down the receive loop.

use crate::core::errors::DecodeError;
use crate::core::fixed::I80F48;
use crate::core::pubkey::{PublicKey, PUBKEY_LEN};

#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Reader positioned at `offset`
    pub fn at(bytes: &'a [u8], offset: usize) -> Self {
        Self { bytes, pos: offset }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    /// Independent reader over `len` bytes starting at absolute `offset`
    ///
    /// Used for fixed-size slots so a slot's padding can never shift the next one.
    pub fn window(&self, offset: usize, len: usize) -> Result<ByteReader<'a>, DecodeError> {
        let end = offset
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(DecodeError::Truncated {
                offset,
                wanted: len,
                len: self.bytes.len(),
            })?;
        Ok(ByteReader::new(&self.bytes[offset..end]))
    }

    /// Skip padding
    pub fn skip(&mut self, n: usize) -> Result<(), DecodeError> {
        self.take(n).map(|_| ())
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let slice = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        self.read_array().map(u64::from_le_bytes)
    }

    pub fn read_i64(&mut self) -> Result<i64, DecodeError> {
        self.read_array().map(i64::from_le_bytes)
    }

    pub fn read_i128(&mut self) -> Result<i128, DecodeError> {
        self.read_array().map(i128::from_le_bytes)
    }

    pub fn read_i80f48(&mut self) -> Result<I80F48, DecodeError> {
        self.read_i128().map(I80F48::from_bits)
    }

    pub fn read_pubkey(&mut self) -> Result<PublicKey, DecodeError> {
        self.read_array::<PUBKEY_LEN>().map(PublicKey::new)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(DecodeError::Truncated {
                offset: self.pos,
                wanted: n,
                len: self.bytes.len(),
            })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

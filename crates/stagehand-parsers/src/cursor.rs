//! Sequenced primitive reads and writes over random-access byte stores
//!
//! Every read is bounds-checked against the store: running out of bytes
//! yields [`ParseError::Truncated`], never a zero-padded value.

use std::marker::PhantomData;

use byteorder::{ByteOrder, LittleEndian};

use crate::traits::{ParseError, ParseResult};

/// Read cursor over an in-memory byte store
#[derive(Debug, Clone)]
pub struct ByteReader<'a, E: ByteOrder = LittleEndian> {
    data: &'a [u8],
    pos: usize,
    _order: PhantomData<E>,
}

impl<'a, E: ByteOrder> ByteReader<'a, E> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            _order: PhantomData,
        }
    }

    /// Total size of the underlying store
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn tell(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Absolute seek; the end of the store is a valid position
    pub fn seek(&mut self, offset: usize) -> ParseResult<()> {
        if offset > self.data.len() {
            return Err(ParseError::Truncated {
                offset: offset as u64,
                requested: 0,
                available: 0,
            });
        }
        self.pos = offset;
        Ok(())
    }

    pub fn skip(&mut self, count: usize) -> ParseResult<()> {
        self.take(count).map(|_| ())
    }

    /// Run `f` at `offset`, then restore the current position whatever `f` returned
    pub fn with_position<T>(
        &mut self,
        offset: usize,
        f: impl FnOnce(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<T> {
        let saved = self.pos;
        let result = self.seek(offset).and_then(|()| f(self));
        self.pos = saved;
        result
    }

    fn take(&mut self, count: usize) -> ParseResult<&'a [u8]> {
        let available = self.remaining();
        if count > available {
            return Err(ParseError::Truncated {
                offset: self.pos as u64,
                requested: count,
                available,
            });
        }
        let slice = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    pub fn read_bytes(&mut self, count: usize) -> ParseResult<&'a [u8]> {
        self.take(count)
    }

    pub fn read_array<const N: usize>(&mut self) -> ParseResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> ParseResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> ParseResult<u16> {
        Ok(E::read_u16(self.take(2)?))
    }

    pub fn read_i16(&mut self) -> ParseResult<i16> {
        Ok(E::read_i16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> ParseResult<u32> {
        Ok(E::read_u32(self.take(4)?))
    }

    pub fn read_i32(&mut self) -> ParseResult<i32> {
        Ok(E::read_i32(self.take(4)?))
    }

    pub fn read_f32(&mut self) -> ParseResult<f32> {
        Ok(E::read_f32(self.take(4)?))
    }

    /// Read `count` consecutive f32 values
    pub fn read_f32s(&mut self, count: usize) -> ParseResult<Vec<f32>> {
        let bytes = self.take(count.checked_mul(4).ok_or_else(|| overflow(self.pos))?)?;
        Ok(bytes.chunks_exact(4).map(E::read_f32).collect())
    }

    pub fn read_vec3(&mut self) -> ParseResult<[f32; 3]> {
        Ok([self.read_f32()?, self.read_f32()?, self.read_f32()?])
    }

    pub fn read_u16s(&mut self, count: usize) -> ParseResult<Vec<u16>> {
        let bytes = self.take(count.checked_mul(2).ok_or_else(|| overflow(self.pos))?)?;
        Ok(bytes.chunks_exact(2).map(E::read_u16).collect())
    }

    pub fn read_u32s(&mut self, count: usize) -> ParseResult<Vec<u32>> {
        let bytes = self.take(count.checked_mul(4).ok_or_else(|| overflow(self.pos))?)?;
        Ok(bytes.chunks_exact(4).map(E::read_u32).collect())
    }

    /// Read a fixed-width string field, trimmed at the first NUL
    pub fn read_fixed_string(&mut self, len: usize) -> ParseResult<String> {
        let bytes = self.take(len)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(decode_text(&bytes[..end]))
    }

    /// Read until a zero byte or the end of the store; the terminator is consumed, not returned
    pub fn read_null_terminated_string(&mut self) -> ParseResult<String> {
        let rest = &self.data[self.pos.min(self.data.len())..];
        let end = rest.iter().position(|&b| b == 0);
        let text = decode_text(&rest[..end.unwrap_or(rest.len())]);
        self.pos += end.map_or(rest.len(), |e| e + 1);
        Ok(text)
    }
}

fn overflow(pos: usize) -> ParseError {
    ParseError::Truncated {
        offset: pos as u64,
        requested: usize::MAX,
        available: 0,
    }
}

/// Decode UTF-8, falling back to Shift-JIS for legacy game text
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::SHIFT_JIS.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Write cursor over a growable buffer
///
/// Seeking past the end is allowed; the gap is zero-filled on the next write,
/// which is how offset tables get patched after layout.
#[derive(Debug, Clone)]
pub struct ByteWriter<E: ByteOrder = LittleEndian> {
    buf: Vec<u8>,
    pos: usize,
    _order: PhantomData<E>,
}

impl<E: ByteOrder> Default for ByteWriter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ByteOrder> ByteWriter<E> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            pos: 0,
            _order: PhantomData,
        }
    }

    pub fn tell(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn seek(&mut self, offset: usize) {
        self.pos = offset;
    }

    /// Zero-fill up to the next multiple of `alignment`
    pub fn align(&mut self, alignment: usize) {
        let aligned = align_to(self.pos, alignment);
        if aligned > self.buf.len() {
            self.buf.resize(aligned, 0);
        }
        self.pos = aligned;
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        let end = self.pos + bytes.len();
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
    }

    pub fn write_u8(&mut self, value: u8) {
        self.write_bytes(&[value]);
    }

    pub fn write_u16(&mut self, value: u16) {
        let mut tmp = [0u8; 2];
        E::write_u16(&mut tmp, value);
        self.write_bytes(&tmp);
    }

    pub fn write_i16(&mut self, value: i16) {
        let mut tmp = [0u8; 2];
        E::write_i16(&mut tmp, value);
        self.write_bytes(&tmp);
    }

    pub fn write_u32(&mut self, value: u32) {
        let mut tmp = [0u8; 4];
        E::write_u32(&mut tmp, value);
        self.write_bytes(&tmp);
    }

    pub fn write_i32(&mut self, value: i32) {
        let mut tmp = [0u8; 4];
        E::write_i32(&mut tmp, value);
        self.write_bytes(&tmp);
    }

    pub fn write_f32(&mut self, value: f32) {
        let mut tmp = [0u8; 4];
        E::write_f32(&mut tmp, value);
        self.write_bytes(&tmp);
    }

    pub fn write_vec3(&mut self, value: [f32; 3]) {
        for component in value {
            self.write_f32(component);
        }
    }

    /// Write `text` into a field of exactly `len` bytes, NUL padded
    pub fn write_fixed_string(&mut self, text: &str, len: usize) -> ParseResult<()> {
        let bytes = text.as_bytes();
        if bytes.len() > len {
            return Err(ParseError::InvalidStructure(format!(
                "string '{}' does not fit a {}-byte field",
                text, len
            )));
        }
        self.write_bytes(bytes);
        self.write_bytes(&vec![0u8; len - bytes.len()]);
        Ok(())
    }

    pub fn write_null_terminated_string(&mut self, text: &str) {
        self.write_bytes(text.as_bytes());
        self.write_u8(0);
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Round `value` up to a multiple of `alignment` (which must be non-zero)
pub fn align_to(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

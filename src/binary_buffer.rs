// binary_buffer.rs

use std::io::{Read, Write};

use crate::error::{HicdexError, Result};

/// A little-endian cursor over an in-memory byte buffer. Used to parse
/// decompressed .hic blocks and to assemble records before they hit the
/// wire; file-level sequential I/O goes through [`ReadLeExt`] /
/// [`WriteLeExt`] instead.
#[derive(Debug, Default)]
pub struct BinaryBuffer {
    buf: Vec<u8>,
    pos: usize,
}

macro_rules! impl_get_put {
    ($get:ident, $put:ident, $t:ty) => {
        pub fn $get(&mut self) -> Result<$t> {
            const N: usize = std::mem::size_of::<$t>();
            let end = self.pos + N;
            if end > self.buf.len() {
                return Err(truncated());
            }
            let v = <$t>::from_le_bytes(self.buf[self.pos..end].try_into().unwrap());
            self.pos = end;
            Ok(v)
        }

        pub fn $put(&mut self, v: $t) {
            self.buf.extend_from_slice(&v.to_le_bytes());
        }
    };
}

impl BinaryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(buf: Vec<u8>) -> Self {
        Self { buf, pos: 0 }
    }

    impl_get_put!(get_u8, put_u8, u8);
    impl_get_put!(get_i16, put_i16, i16);
    impl_get_put!(get_u16, put_u16, u16);
    impl_get_put!(get_i32, put_i32, i32);
    impl_get_put!(get_u32, put_u32, u32);
    impl_get_put!(get_i64, put_i64, i64);
    impl_get_put!(get_u64, put_u64, u64);
    impl_get_put!(get_f32, put_f32, f32);
    impl_get_put!(get_f64, put_f64, f64);

    pub fn get_bytes(&mut self, n: usize) -> Result<&[u8]> {
        let end = self.pos + n;
        if end > self.buf.len() {
            return Err(truncated());
        }
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    /// Read a null-terminated C string.
    pub fn get_cstring(&mut self) -> Result<String> {
        let rest = &self.buf[self.pos..];
        let nul = rest.iter().position(|&b| b == 0).ok_or_else(truncated)?;
        let s = String::from_utf8(rest[..nul].to_vec())
            .map_err(|e| HicdexError::FormatError(format!("invalid string: {e}")))?;
        self.pos += nul + 1;
        Ok(s)
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write a string followed by a null terminator.
    pub fn put_cstring(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.pos = 0;
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

fn truncated() -> HicdexError {
    HicdexError::FormatError("unexpected end of buffer".into())
}

/// Little-endian primitive reads for sequential file parsing.
pub trait ReadLeExt: Read {
    fn read_u8_le(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.read_exact(&mut b)?;
        Ok(b[0])
    }

    fn read_i16_le(&mut self) -> Result<i16> {
        let mut b = [0u8; 2];
        self.read_exact(&mut b)?;
        Ok(i16::from_le_bytes(b))
    }

    fn read_i32_le(&mut self) -> Result<i32> {
        let mut b = [0u8; 4];
        self.read_exact(&mut b)?;
        Ok(i32::from_le_bytes(b))
    }

    fn read_i64_le(&mut self) -> Result<i64> {
        let mut b = [0u8; 8];
        self.read_exact(&mut b)?;
        Ok(i64::from_le_bytes(b))
    }

    fn read_f32_le(&mut self) -> Result<f32> {
        let mut b = [0u8; 4];
        self.read_exact(&mut b)?;
        Ok(f32::from_le_bytes(b))
    }

    fn read_f64_le(&mut self) -> Result<f64> {
        let mut b = [0u8; 8];
        self.read_exact(&mut b)?;
        Ok(f64::from_le_bytes(b))
    }

    fn read_cstring_le(&mut self) -> Result<String> {
        let mut buf = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            self.read_exact(&mut byte)?;
            if byte[0] == 0 {
                break;
            }
            buf.push(byte[0]);
        }
        String::from_utf8(buf).map_err(|e| HicdexError::FormatError(format!("invalid string: {e}")))
    }
}

impl<R: Read> ReadLeExt for R {}

/// Little-endian primitive writes for sequential file serialization.
pub trait WriteLeExt: Write {
    fn write_u8_le(&mut self, v: u8) -> Result<()> {
        Ok(self.write_all(&[v])?)
    }

    fn write_i16_le(&mut self, v: i16) -> Result<()> {
        Ok(self.write_all(&v.to_le_bytes())?)
    }

    fn write_i32_le(&mut self, v: i32) -> Result<()> {
        Ok(self.write_all(&v.to_le_bytes())?)
    }

    fn write_i64_le(&mut self, v: i64) -> Result<()> {
        Ok(self.write_all(&v.to_le_bytes())?)
    }

    fn write_f32_le(&mut self, v: f32) -> Result<()> {
        Ok(self.write_all(&v.to_le_bytes())?)
    }

    fn write_f64_le(&mut self, v: f64) -> Result<()> {
        Ok(self.write_all(&v.to_le_bytes())?)
    }

    fn write_cstring_le(&mut self, s: &str) -> Result<()> {
        self.write_all(s.as_bytes())?;
        Ok(self.write_all(&[0])?)
    }
}

impl<W: Write> WriteLeExt for W {}

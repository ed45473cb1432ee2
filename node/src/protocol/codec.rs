//! Low-level field encoding/decoding shared by every wire message.
//!
//! Writing goes through [`bytebuffer::ByteBuffer`], the same length-prefixed
//! binary-framing helper this codebase already reaches for when it needs to
//! hand-build a wire format. Reading is a small bounds-checked cursor: every
//! field read can fail, and a short buffer must become a [`DecodeError`]
//! rather than a panic.

use bytebuffer::ByteBuffer;

use crate::error::DecodeError;
use crate::types::{NodeAddress, NodeInfo};

pub struct Writer {
    buf: ByteBuffer,
}

impl Writer {
    pub fn new() -> Self {
        Self { buf: ByteBuffer::new() }
    }

    pub fn write_u8(&mut self, v: u8) -> &mut Self {
        self.buf.write_u8(v);
        self
    }

    pub fn write_u16(&mut self, v: u16) -> &mut Self {
        self.buf.write_u16(v);
        self
    }

    pub fn write_u32(&mut self, v: u32) -> &mut Self {
        self.buf.write_u32(v);
        self
    }

    pub fn write_bool(&mut self, v: bool) -> &mut Self {
        self.buf.write_u8(if v { 1 } else { 0 });
        self
    }

    pub fn write_string(&mut self, s: &str) -> &mut Self {
        self.buf.write_u32(s.len() as u32);
        self.buf.write_bytes(s.as_bytes());
        self
    }

    pub fn write_node_info(&mut self, info: &NodeInfo) -> &mut Self {
        self.write_u32(info.id);
        self.write_string(&info.address.host);
        self.write_u16(info.address.port);
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf.to_bytes()
    }
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(n).ok_or(DecodeError::Truncated)?;
        let slice = self.data.get(self.pos..end).ok_or(DecodeError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
    }

    pub fn read_node_info(&mut self) -> Result<NodeInfo, DecodeError> {
        let id = self.read_u32()?;
        let host = self.read_string()?;
        let port = self.read_u16()?;
        Ok(NodeInfo { id, address: NodeAddress { host, port } })
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_scalars() {
        let mut w = Writer::new();
        w.write_u8(7).write_u16(300).write_u32(70_000).write_bool(true);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert_eq!(r.read_u8().unwrap(), 7);
        assert_eq!(r.read_u16().unwrap(), 300);
        assert_eq!(r.read_u32().unwrap(), 70_000);
        assert!(r.read_bool().unwrap());
    }

    #[test]
    fn round_trips_string_and_node_info() {
        let info = NodeInfo::new(NodeAddress::new("10.1.2.3", 9999));
        let mut w = Writer::new();
        w.write_string("hello world");
        w.write_node_info(&info);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert_eq!(r.read_string().unwrap(), "hello world");
        assert_eq!(r.read_node_info().unwrap(), info);
    }

    #[test]
    fn truncated_buffer_is_an_error_not_a_panic() {
        let mut r = Reader::new(&[0x00, 0x01]);
        assert!(matches!(r.read_u32(), Err(DecodeError::Truncated)));
    }
}

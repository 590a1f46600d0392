//! Bounds-checked little-endian reading and writing of NTLM messages.


use crate::error::{Error, ProtocolError};


/// An NTLM security buffer, pointing to data contained later in the message.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SecurityBuffer {
    pub length: u16,
    pub capacity: u16,
    pub offset: u32,
}

impl SecurityBuffer {
    /// Generates a security buffer describing `length` bytes at `offset`.
    ///
    /// The capacity is set to the length. Fails if either value exceeds its field width.
    pub fn new(field: &'static str, length: usize, offset: usize) -> Result<Self, Error> {
        let length_u16: u16 = length.try_into()
            .or(Err(Error::FieldTooLong { field, length }))?;
        let offset_u32: u32 = offset.try_into()
            .or(Err(Error::FieldTooLong { field, length: offset }))?;
        Ok(Self {
            length: length_u16,
            capacity: length_u16,
            offset: offset_u32,
        })
    }

    /// Applies the security buffer to a complete message, extracting the data itself.
    ///
    /// An empty buffer yields an empty slice regardless of its offset.
    pub fn apply_to_slice<'a>(&self, field: &'static str, message: &'a [u8]) -> Result<&'a [u8], ProtocolError> {
        let length = usize::from(self.length);
        if length == 0 {
            return Ok(&message[0..0]);
        }

        let start = self.offset as usize;
        let end = start.checked_add(length)
            .ok_or(ProtocolError::Truncated { field, needed: usize::MAX, available: message.len() })?;

        message.get(start..end)
            .ok_or(ProtocolError::Truncated { field, needed: end, available: message.len() })
    }
}


/// Reads little-endian fields from a byte slice, failing instead of running past its end.
#[derive(Clone, Debug)]
pub struct Reader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// The offset of the next byte to be read.
    pub fn position(&self) -> usize {
        self.position
    }

    /// The number of bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Reads the next `count` bytes. `field` names what is being read in case of truncation.
    pub fn read_bytes(&mut self, field: &'static str, count: usize) -> Result<&'a [u8], ProtocolError> {
        let available = self.remaining();
        if count > available {
            return Err(ProtocolError::Truncated { field, needed: count, available });
        }
        let bytes = &self.data[self.position..self.position + count];
        self.position += count;
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], ProtocolError> {
        let mut ret = [0u8; N];
        ret.copy_from_slice(self.read_bytes(field, N)?);
        Ok(ret)
    }

    pub fn skip(&mut self, field: &'static str, count: usize) -> Result<(), ProtocolError> {
        self.read_bytes(field, count).map(|_| ())
    }

    pub fn read_u16_le(&mut self, field: &'static str) -> Result<u16, ProtocolError> {
        self.read_array(field).map(u16::from_le_bytes)
    }

    pub fn read_u32_le(&mut self, field: &'static str) -> Result<u32, ProtocolError> {
        self.read_array(field).map(u32::from_le_bytes)
    }

    /// Reads a length/capacity/offset triple.
    pub fn read_security_buffer(&mut self, field: &'static str) -> Result<SecurityBuffer, ProtocolError> {
        let length = self.read_u16_le(field)?;
        let capacity = self.read_u16_le(field)?;
        let offset = self.read_u32_le(field)?;
        Ok(SecurityBuffer { length, capacity, offset })
    }
}


/// Assembles a message front to back.
///
/// Fixed-size header fields are written in order; the MIC field is patched in afterwards with
/// [`Writer::overwrite`].
#[derive(Clone, Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: Vec::with_capacity(capacity) }
    }

    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn put_zeros(&mut self, count: usize) {
        self.buf.resize(self.buf.len() + count, 0);
    }

    pub fn put_u16_le(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u32_le(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_security_buffer(&mut self, sb: &SecurityBuffer) {
        self.put_u16_le(sb.length);
        self.put_u16_le(sb.capacity);
        self.put_u32_le(sb.offset);
    }

    /// Replaces already written bytes starting at `offset`.
    ///
    /// Returns `false` without modifying anything if the range has not been written yet.
    pub fn overwrite(&mut self, offset: usize, bytes: &[u8]) -> bool {
        match self.buf.get_mut(offset..offset + bytes.len()) {
            Some(target) => {
                target.copy_from_slice(bytes);
                true
            },
            None => false,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

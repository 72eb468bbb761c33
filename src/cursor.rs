use crate::error::{DnsError, Result};

/// Read position over a whole DNS message.
///
/// Every read is bounds-checked; running off the end yields
/// `DnsError::TruncatedInput` rather than a panic. The cursor always spans
/// the complete message so that compression pointers can be followed.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    current: usize,
}

impl<'a> Cursor<'a> {
    pub fn from(buf: &'a [u8]) -> Self {
        Cursor { buf, current: 0 }
    }

    pub fn at(&mut self, index: usize) {
        self.current = index;
    }

    pub fn get_current_index(&self) -> usize {
        self.current
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.current)
    }

    pub fn peek(&self) -> Result<u8> {
        self.check(1)?;
        Ok(self.buf[self.current])
    }

    pub fn take(&mut self) -> Result<u8> {
        let result = self.peek()?;
        self.current += 1;
        Ok(result)
    }

    pub fn take_slice(&mut self, len: usize) -> Result<&'a [u8]> {
        self.check(len)?;
        let result = &self.buf[self.current..self.current + len];
        self.current += len;
        Ok(result)
    }

    pub fn take_bytes<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(self.take_slice(N)?);
        Ok(bytes)
    }

    pub fn take_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take_bytes()?))
    }

    pub fn take_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take_bytes()?))
    }

    fn check(&self, needed: usize) -> Result<()> {
        if self.remaining() < needed {
            return Err(DnsError::TruncatedInput {
                offset: self.current,
                needed,
                len: self.buf.len(),
            });
        }
        Ok(())
    }
}

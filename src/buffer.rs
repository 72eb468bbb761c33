pub const PACKET_SIZE: usize = 512;

/// Receive buffer for a single datagram. A new one is made for every packet
/// read off a socket, so nothing from a previous datagram can leak into the
/// next.
pub struct PacketBuffer {
    buf: [u8; PACKET_SIZE],
    len: usize,
}

impl PacketBuffer {
    pub fn new() -> Self {
        PacketBuffer {
            buf: [0u8; PACKET_SIZE],
            len: 0,
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Records how many bytes the last `recv` wrote.
    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(PACKET_SIZE);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }
}

impl Default for PacketBuffer {
    fn default() -> Self {
        PacketBuffer::new()
    }
}

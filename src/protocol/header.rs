use crate::cursor::Cursor;
use crate::error::Result;

pub const HEADER_SIZE: usize = 12;

pub const OPCODE_QUERY: u8 = 0;
pub const RCODE_NO_ERROR: u8 = 0;
pub const RCODE_NOT_IMPLEMENTED: u8 = 4;

const QR_SHIFT: u16 = 15;
const OPCODE_SHIFT: u16 = 11;
const AA_SHIFT: u16 = 10;
const TC_SHIFT: u16 = 9;
const RD_SHIFT: u16 = 8;
const RA_SHIFT: u16 = 7;
const Z_SHIFT: u16 = 4;

/// The fixed 12-byte section at the start of every message.
///
/// The flags word is packed most significant bit first as
/// `QR(1) OPCODE(4) AA(1) TC(1) RD(1) RA(1) Z(3) RCODE(4)`.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Header {
    pub id: u16,
    pub qr: bool,
    pub opcode: u8,
    pub aa: bool,
    pub tc: bool,
    pub rd: bool,
    pub ra: bool,
    pub z: u8,
    pub rcode: u8,
    pub question_count: u16,
    pub answer_count: u16,
    pub authority_count: u16,
    pub additional_count: u16,
}

impl Header {
    pub fn flags(&self) -> u16 {
        (self.qr as u16) << QR_SHIFT
            | ((self.opcode & 0x0F) as u16) << OPCODE_SHIFT
            | (self.aa as u16) << AA_SHIFT
            | (self.tc as u16) << TC_SHIFT
            | (self.rd as u16) << RD_SHIFT
            | (self.ra as u16) << RA_SHIFT
            | ((self.z & 0x07) as u16) << Z_SHIFT
            | (self.rcode & 0x0F) as u16
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut result = [0u8; HEADER_SIZE];
        result[0..2].copy_from_slice(&self.id.to_be_bytes());
        result[2..4].copy_from_slice(&self.flags().to_be_bytes());
        result[4..6].copy_from_slice(&self.question_count.to_be_bytes());
        result[6..8].copy_from_slice(&self.answer_count.to_be_bytes());
        result[8..10].copy_from_slice(&self.authority_count.to_be_bytes());
        result[10..12].copy_from_slice(&self.additional_count.to_be_bytes());
        result
    }

    /// Reads every header field exactly as it appears on the wire.
    pub fn parse(cursor: &mut Cursor<'_>) -> Result<Self> {
        let id = cursor.take_u16()?;
        let flags = cursor.take_u16()?;
        Ok(Header {
            id,
            qr: bit(flags, QR_SHIFT),
            opcode: ((flags >> OPCODE_SHIFT) & 0x0F) as u8,
            aa: bit(flags, AA_SHIFT),
            tc: bit(flags, TC_SHIFT),
            rd: bit(flags, RD_SHIFT),
            ra: bit(flags, RA_SHIFT),
            z: ((flags >> Z_SHIFT) & 0x07) as u8,
            rcode: (flags & 0x0F) as u8,
            question_count: cursor.take_u16()?,
            answer_count: cursor.take_u16()?,
            authority_count: cursor.take_u16()?,
            additional_count: cursor.take_u16()?,
        })
    }

    /// Decodes a client query header into the header of the reply to it.
    ///
    /// ID, OPCODE, RD and the question/authority/additional counts are taken
    /// from the query. QR is always set, AA/TC/RA/Z are always clear, the
    /// answer count is left at zero for the caller to fill in, and RCODE is
    /// "not implemented" for any opcode other than a standard query.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let raw = Header::parse(&mut Cursor::from(bytes))?;
        let rcode = if raw.opcode == OPCODE_QUERY {
            RCODE_NO_ERROR
        } else {
            RCODE_NOT_IMPLEMENTED
        };
        Ok(Header {
            id: raw.id,
            qr: true,
            opcode: raw.opcode,
            rd: raw.rd,
            rcode,
            question_count: raw.question_count,
            authority_count: raw.authority_count,
            additional_count: raw.additional_count,
            ..Default::default()
        })
    }
}

fn bit(flags: u16, shift: u16) -> bool {
    (flags >> shift) & 1 == 1
}

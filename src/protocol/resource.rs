use std::net::Ipv4Addr;

use crate::cursor::Cursor;
use crate::error::{DnsError, Result};
use crate::protocol::{encode_name, parse_name};

pub const TYPE_A: u16 = 1;
pub const TYPE_NS: u16 = 2;
pub const TYPE_CNAME: u16 = 5;
pub const TYPE_SOA: u16 = 6;
pub const TYPE_PTR: u16 = 12;
pub const TYPE_MX: u16 = 15;
pub const CLASS_IN: u16 = 1;

const A_DATA_LEN: u16 = 4;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RecordData {
    A(Ipv4Addr),
    /// Target of a CNAME, NS or PTR record, with any compression expanded.
    Name(String),
    Mx {
        preference: u16,
        exchange: String,
    },
    Soa(Soa),
    /// Copied byte for byte. Only the types above may compress names in
    /// their data, so these bytes stay valid wherever they are written.
    Other(Vec<u8>),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Soa {
    pub mname: String,
    pub rname: String,
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum: u32,
}

impl Soa {
    fn parse(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(Soa {
            mname: parse_name(cursor)?,
            rname: parse_name(cursor)?,
            serial: cursor.take_u32()?,
            refresh: cursor.take_u32()?,
            retry: cursor.take_u32()?,
            expire: cursor.take_u32()?,
            minimum: cursor.take_u32()?,
        })
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut vec = encode_name(&self.mname)?;
        vec.extend(encode_name(&self.rname)?);
        for n in [self.serial, self.refresh, self.retry, self.expire, self.minimum] {
            vec.extend(&n.to_be_bytes());
        }
        Ok(vec)
    }
}

/// Name + TYPE + CLASS + TTL + RDLENGTH + RDATA.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ResourceRecord {
    pub name: String,
    pub _type: u16,
    pub class: u16,
    pub ttl: u32,
    pub data: RecordData,
}

impl ResourceRecord {
    pub fn a(name: &str, ttl: u32, addr: Ipv4Addr) -> Self {
        ResourceRecord {
            name: name.to_string(),
            _type: TYPE_A,
            class: CLASS_IN,
            ttl,
            data: RecordData::A(addr),
        }
    }

    pub fn parse(cursor: &mut Cursor<'_>) -> Result<Self> {
        let name = parse_name(cursor)?;
        let _type = cursor.take_u16()?;
        let class = cursor.take_u16()?;
        let ttl = cursor.take_u32()?;
        let data_len = cursor.take_u16()?;
        let start = cursor.get_current_index();
        // names in the data may be compressed, so they are read against the
        // whole message, then checked to end where RDLENGTH says
        let data = match _type {
            TYPE_A => {
                if data_len != A_DATA_LEN {
                    return Err(DnsError::malformed(format!(
                        "A record for {} has RDLENGTH {}",
                        name, data_len
                    )));
                }
                RecordData::A(Ipv4Addr::from(cursor.take_bytes::<4>()?))
            }
            TYPE_NS | TYPE_CNAME | TYPE_PTR => RecordData::Name(parse_name(cursor)?),
            TYPE_MX => {
                let preference = cursor.take_u16()?;
                let exchange = parse_name(cursor)?;
                RecordData::Mx {
                    preference,
                    exchange,
                }
            }
            TYPE_SOA => RecordData::Soa(Soa::parse(cursor)?),
            _ => RecordData::Other(cursor.take_slice(data_len as usize)?.to_vec()),
        };
        if cursor.get_current_index() != start + data_len as usize {
            return Err(DnsError::malformed(format!(
                "record data for {} does not match RDLENGTH {}",
                name, data_len
            )));
        }
        Ok(ResourceRecord {
            name,
            _type,
            class,
            ttl,
            data,
        })
    }

    /// Wire form with every name spelled out in full; RDLENGTH is derived
    /// from the encoded data.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let data = match &self.data {
            RecordData::A(addr) => addr.octets().to_vec(),
            RecordData::Name(target) => encode_name(target)?,
            RecordData::Mx {
                preference,
                exchange,
            } => {
                let mut vec = preference.to_be_bytes().to_vec();
                vec.extend(encode_name(exchange)?);
                vec
            }
            RecordData::Soa(soa) => soa.to_bytes()?,
            RecordData::Other(bytes) => bytes.clone(),
        };
        let data_len = u16::try_from(data.len())
            .map_err(|_| DnsError::malformed(format!("record data for {} too long", self.name)))?;
        let mut vec = encode_name(&self.name)?;
        vec.extend(&self._type.to_be_bytes());
        vec.extend(&self.class.to_be_bytes());
        vec.extend(&self.ttl.to_be_bytes());
        vec.extend(&data_len.to_be_bytes());
        vec.extend(data);
        Ok(vec)
    }
}

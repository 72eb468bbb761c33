mod header;
mod question;
mod resource;

use std::collections::HashSet;

use crate::cursor::Cursor;
use crate::error::{DnsError, Result};

pub use header::{Header, HEADER_SIZE, RCODE_NOT_IMPLEMENTED};
pub use question::{parse_questions, Question};
pub use resource::{RecordData, ResourceRecord, CLASS_IN, TYPE_A, TYPE_CNAME};

const C_FACTOR: u8 = 0b1100_0000;
const DC_FACTOR: u16 = 0x3FFF;
const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 255;

/// Reads a possibly compressed name starting at the cursor.
///
/// On return the cursor sits just past the name as it is spelled at the
/// original position: after the terminating zero byte, or after the two
/// bytes of the first compression pointer met. Each pointer must point to an
/// earlier offset and may only be visited once.
///
/// Label bytes outside printable ASCII come back as `\DDD`, and a literal
/// `.` or `\` inside a label is backslash-escaped, so `encode_name` gives
/// back the exact bytes that were read.
fn parse_name(cursor: &mut Cursor<'_>) -> Result<String> {
    let mut reader = cursor.clone();
    let mut name = String::new();
    let mut visited = HashSet::new();
    let mut jumped = false;
    let mut name_len = 1usize;

    loop {
        let seg_len = reader.peek()?;
        if seg_len & C_FACTOR == C_FACTOR {
            let pointer_at = reader.get_current_index();
            let target = (reader.take_u16()? & DC_FACTOR) as usize;
            if !jumped {
                cursor.at(reader.get_current_index());
                jumped = true;
            }
            if target >= pointer_at {
                return Err(DnsError::malformed(format!(
                    "compression pointer at {} refers forward to {}",
                    pointer_at, target
                )));
            }
            if !visited.insert(pointer_at) {
                return Err(DnsError::malformed(format!(
                    "compression loop through pointer at {}",
                    pointer_at
                )));
            }
            reader.at(target);
        } else if seg_len & C_FACTOR != 0 {
            return Err(DnsError::malformed(format!(
                "unsupported label type 0x{:02x} at {}",
                seg_len,
                reader.get_current_index()
            )));
        } else {
            reader.take()?;
            if seg_len == 0 {
                break;
            }
            let segment = reader.take_slice(seg_len as usize)?;
            name_len += seg_len as usize + 1;
            if name_len > MAX_NAME_LEN {
                return Err(DnsError::malformed("domain name longer than 255 bytes"));
            }
            if !name.is_empty() {
                name.push('.');
            }
            escape_label(&mut name, segment);
        }
    }

    if !jumped {
        cursor.at(reader.get_current_index());
    }
    Ok(name)
}

fn escape_label(name: &mut String, label: &[u8]) {
    for &b in label {
        match b {
            b'.' | b'\\' => {
                name.push('\\');
                name.push(b as char);
            }
            0x21..=0x7E => name.push(b as char),
            _ => name.push_str(&format!("\\{:03}", b)),
        }
    }
}

/// Decodes the name at `offset` in `message`, returning it in dotted form
/// together with the offset of the first byte after it.
pub fn decode_name(message: &[u8], offset: usize) -> Result<(String, usize)> {
    let mut cursor = Cursor::from(message);
    cursor.at(offset);
    let name = parse_name(&mut cursor)?;
    Ok((name, cursor.get_current_index()))
}

/// Encodes a dotted name as length-prefixed labels ending in a zero byte.
/// Names are never compressed. A single trailing dot is accepted, and
/// `\DDD` or `\<char>` escapes stand for the raw byte.
pub fn encode_name(name: &str) -> Result<Vec<u8>> {
    let mut vec = Vec::with_capacity(name.len() + 2);
    for label in split_labels(name)? {
        if label.is_empty() {
            return Err(invalid_name(name, "empty label"));
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(invalid_name(
                name,
                format!("label of {} bytes exceeds {}", label.len(), MAX_LABEL_LEN),
            ));
        }
        vec.push(label.len() as u8);
        vec.extend(label);
    }
    vec.push(0);
    if vec.len() > MAX_NAME_LEN {
        return Err(invalid_name(name, "encoded name exceeds 255 bytes"));
    }
    Ok(vec)
}

/// Unescaped label bytes of a dotted name. The root (`""` or `"."`) has no
/// labels.
fn split_labels(name: &str) -> Result<Vec<Vec<u8>>> {
    let mut labels = Vec::new();
    if name.is_empty() || name == "." {
        return Ok(labels);
    }
    let mut label = Vec::new();
    let mut bytes = name.bytes();
    while let Some(b) = bytes.next() {
        match b {
            b'.' => labels.push(std::mem::take(&mut label)),
            b'\\' => label.push(unescape(name, &mut bytes)?),
            _ => label.push(b),
        }
    }
    if !label.is_empty() {
        labels.push(label);
    }
    Ok(labels)
}

fn unescape(name: &str, bytes: &mut std::str::Bytes<'_>) -> Result<u8> {
    match bytes.next() {
        Some(d) if d.is_ascii_digit() => {
            let mut value = u16::from(d - b'0');
            for _ in 0..2 {
                match bytes.next() {
                    Some(d) if d.is_ascii_digit() => value = value * 10 + u16::from(d - b'0'),
                    _ => return Err(invalid_name(name, "escape needs three digits")),
                }
            }
            u8::try_from(value)
                .map_err(|_| invalid_name(name, format!("escape \\{} is above 255", value)))
        }
        Some(b) => Ok(b),
        None => Err(invalid_name(name, "name ends in a lone backslash")),
    }
}

fn invalid_name(name: &str, reason: impl Into<String>) -> DnsError {
    DnsError::InvalidName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Turns a cursor overrun inside a counted section into a malformed-message
/// error: the header promised more entries than the datagram holds.
fn section_overrun(
    section: &str,
    index: u16,
    count: u16,
) -> impl FnOnce(DnsError) -> DnsError + '_ {
    move |e| match e {
        DnsError::TruncatedInput { offset, .. } => DnsError::malformed(format!(
            "{} entry {} of {} runs past end of message at offset {}",
            section,
            index + 1,
            count,
            offset
        )),
        other => other,
    }
}

/// Fully decoded message. Used to pick apart upstream replies.
#[derive(Debug, Clone)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
    pub authorities: Vec<ResourceRecord>,
    pub additionals: Vec<ResourceRecord>,
}

impl Message {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::from(bytes);
        let header = Header::parse(&mut cursor)?;
        let mut questions = Vec::new();
        for i in 0..header.question_count {
            let question = Question::parse(&mut cursor)
                .map_err(section_overrun("question", i, header.question_count))?;
            questions.push(question);
        }
        let answers = parse_records(&mut cursor, "answer", header.answer_count)?;
        let authorities = parse_records(&mut cursor, "authority", header.authority_count)?;
        let additionals = parse_records(&mut cursor, "additional", header.additional_count)?;
        Ok(Message {
            header,
            questions,
            answers,
            authorities,
            additionals,
        })
    }
}

fn parse_records(
    cursor: &mut Cursor<'_>,
    section: &str,
    count: u16,
) -> Result<Vec<ResourceRecord>> {
    let mut records = Vec::new();
    for i in 0..count {
        records.push(ResourceRecord::parse(cursor).map_err(section_overrun(section, i, count))?);
    }
    Ok(records)
}

use crate::cursor::Cursor;
use crate::error::Result;
use crate::protocol::{encode_name, parse_name, section_overrun, CLASS_IN, TYPE_A};

/// One entry of the question section. Type and class are carried as read,
/// never interpreted.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Question {
    pub name: String,
    pub _type: u16,
    pub class: u16,
}

impl Question {
    pub fn a(name: &str) -> Self {
        Question {
            name: name.to_string(),
            _type: TYPE_A,
            class: CLASS_IN,
        }
    }

    pub fn parse(cursor: &mut Cursor<'_>) -> Result<Self> {
        let name = parse_name(cursor)?;
        let _type = cursor.take_u16()?;
        let class = cursor.take_u16()?;
        Ok(Question { name, _type, class })
    }

    /// Wire form with the name spelled out in full.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut result = encode_name(&self.name)?;
        result.extend(&self._type.to_be_bytes());
        result.extend(&self.class.to_be_bytes());
        Ok(result)
    }
}

/// Reads `count` questions starting at `offset` and returns them with the
/// offset just past the last one.
pub fn parse_questions(
    message: &[u8],
    offset: usize,
    count: u16,
) -> Result<(Vec<Question>, usize)> {
    let mut cursor = Cursor::from(message);
    cursor.at(offset);
    let mut questions = Vec::new();
    for i in 0..count {
        let question =
            Question::parse(&mut cursor).map_err(section_overrun("question", i, count))?;
        questions.push(question);
    }
    Ok((questions, cursor.get_current_index()))
}

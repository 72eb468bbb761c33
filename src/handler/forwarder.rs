use std::sync::Arc;

use futures_util::future::try_join_all;

use crate::config::MergeStrategy;
use crate::error::{DnsError, Result};
use crate::handler::upstream::Upstream;
use crate::protocol::{parse_questions, Header, Message, Question, HEADER_SIZE};

/// Relays client queries to the upstream resolver.
///
/// Queries with at most one question go out untouched and the reply comes
/// back untouched. Queries with several questions are split into one query
/// per question and the replies are merged under a single header carrying
/// the client's ID.
pub struct Forwarder {
    upstream: Arc<dyn Upstream>,
    merge_strategy: MergeStrategy,
}

impl Forwarder {
    pub fn new(upstream: Arc<dyn Upstream>, merge_strategy: MergeStrategy) -> Self {
        Forwarder {
            upstream,
            merge_strategy,
        }
    }

    pub async fn handle_client_query(&self, raw: &[u8]) -> Result<Vec<u8>> {
        let header = Header::deserialize(raw)?;
        let (questions, _) = parse_questions(raw, HEADER_SIZE, header.question_count)?;
        if questions.len() <= 1 {
            return self.upstream.forward(raw).await;
        }

        debug!(
            "query {:#06x} has {} questions, forwarding each separately",
            header.id,
            questions.len()
        );
        let sub_queries = questions
            .iter()
            .map(|q| sub_query(&raw[..HEADER_SIZE], q))
            .collect::<Result<Vec<_>>>()?;
        let replies = try_join_all(sub_queries.iter().map(|q| self.upstream.forward(q))).await?;

        match self.merge_strategy {
            MergeStrategy::Splice => splice(header, questions.len(), &replies),
            MergeStrategy::Reencode => reencode(header, &questions, &replies),
        }
    }
}

/// The client's header with its counts cut down to a lone question, followed
/// by that question spelled out in full. Writing the name uncompressed keeps
/// it valid even when the client compressed it against an earlier question.
fn sub_query(header: &[u8], question: &Question) -> Result<Vec<u8>> {
    let mut vec = header.to_vec();
    vec[4..6].copy_from_slice(&1u16.to_be_bytes());
    vec[6..HEADER_SIZE].fill(0);
    vec.extend(question.to_bytes()?);
    Ok(vec)
}

fn combined_header(
    mut header: Header,
    question_count: usize,
    answer_count: usize,
) -> Result<Header> {
    header.question_count = count(question_count)?;
    header.answer_count = count(answer_count)?;
    header.authority_count = 0;
    header.additional_count = 0;
    Ok(header)
}

fn count(n: usize) -> Result<u16> {
    u16::try_from(n)
        .map_err(|_| DnsError::malformed(format!("{} entries do not fit a section count", n)))
}

/// Everything after each reply's header, back to back. Assumes every reply
/// holds one question and one answer and that no reply uses compression
/// pointers, since their offsets are not rewritten.
fn splice(header: Header, question_count: usize, replies: &[Vec<u8>]) -> Result<Vec<u8>> {
    let header = combined_header(header, question_count, replies.len())?;
    let mut vec = header.to_bytes().to_vec();
    for reply in replies {
        if reply.len() < HEADER_SIZE {
            return Err(DnsError::TruncatedInput {
                offset: 0,
                needed: HEADER_SIZE,
                len: reply.len(),
            });
        }
        vec.extend(&reply[HEADER_SIZE..]);
    }
    Ok(vec)
}

/// Questions from the client followed by every answer record from every
/// reply, all written out uncompressed.
fn reencode(header: Header, questions: &[Question], replies: &[Vec<u8>]) -> Result<Vec<u8>> {
    let mut answers = Vec::new();
    for reply in replies {
        let message = Message::parse(reply)?;
        if message.answers.len() != 1
            || !message.authorities.is_empty()
            || !message.additionals.is_empty()
        {
            debug!(
                "sub-reply {:#06x}: kept {} answers, dropped {} authority and {} additional",
                message.header.id,
                message.answers.len(),
                message.authorities.len(),
                message.additionals.len()
            );
        }
        answers.extend(message.answers);
    }

    let header = combined_header(header, questions.len(), answers.len())?;
    let mut vec = header.to_bytes().to_vec();
    for question in questions {
        vec.extend(question.to_bytes()?);
    }
    for answer in &answers {
        vec.extend(answer.to_bytes()?);
    }
    Ok(vec)
}

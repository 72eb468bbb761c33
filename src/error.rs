use std::io;
use std::net::SocketAddr;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DnsError>;

#[derive(Error, Debug)]
pub enum DnsError {
    #[error("truncated input: need {needed} bytes at offset {offset}, message has {len}")]
    TruncatedInput {
        offset: usize,
        needed: usize,
        len: usize,
    },

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("invalid domain name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("upstream {addr} unreachable: {reason}")]
    UpstreamUnreachable { addr: SocketAddr, reason: String },

    #[error("failed to send response to {addr}: {source}")]
    SendFailure {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DnsError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        DnsError::MalformedMessage(reason.into())
    }

    pub fn unreachable(addr: SocketAddr, reason: impl ToString) -> Self {
        DnsError::UpstreamUnreachable {
            addr,
            reason: reason.to_string(),
        }
    }
}

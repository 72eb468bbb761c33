use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::buffer::PacketBuffer;
use crate::error::{DnsError, Result};

#[async_trait]
pub trait Upstream: Send + Sync {
    /// Sends a raw query and returns the raw reply.
    async fn forward(&self, query: &[u8]) -> Result<Vec<u8>>;
}

/// Resolver reached over plain UDP, one socket per query.
pub struct UdpUpstream {
    addr: SocketAddr,
    timeout: Duration,
}

impl UdpUpstream {
    pub fn new(addr: SocketAddr, timeout: Duration) -> Self {
        UdpUpstream { addr, timeout }
    }

    fn bind_addr(&self) -> SocketAddr {
        if self.addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        }
    }
}

#[async_trait]
impl Upstream for UdpUpstream {
    async fn forward(&self, query: &[u8]) -> Result<Vec<u8>> {
        let addr = self.addr;
        let socket = UdpSocket::bind(self.bind_addr())
            .await
            .map_err(|e| DnsError::unreachable(addr, e))?;
        // connected, so datagrams from anyone but the resolver are discarded
        socket
            .connect(addr)
            .await
            .map_err(|e| DnsError::unreachable(addr, e))?;
        socket
            .send(query)
            .await
            .map_err(|e| DnsError::unreachable(addr, e))?;

        let mut buffer = PacketBuffer::new();
        let len = timeout(self.timeout, socket.recv(buffer.as_mut_slice()))
            .await
            .map_err(|_| {
                DnsError::unreachable(addr, format!("no reply within {:?}", self.timeout))
            })?
            .map_err(|e| DnsError::unreachable(addr, e))?;
        buffer.set_len(len);
        debug!("{} bytes from upstream {}", len, addr);
        Ok(buffer.as_slice().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::time::Duration;

    use tokio::net::UdpSocket;

    use crate::error::DnsError;
    use crate::handler::upstream::{UdpUpstream, Upstream};
    use crate::protocol::tests::a_reply;

    #[tokio::test]
    async fn should_return_resolver_reply_when_call_forward_given_responsive_resolver() {
        let resolver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let resolver_addr = resolver.local_addr().unwrap();
        let reply = a_reply(0x04D2, "example.com", Ipv4Addr::new(1, 2, 3, 4));
        let expected = reply.clone();
        let server = tokio::spawn(async move {
            let mut buf = [0u8; 512];
            let (len, src) = resolver.recv_from(&mut buf).await.unwrap();
            resolver.send_to(&reply, src).await.unwrap();
            buf[..len].to_vec()
        });
        let upstream = UdpUpstream::new(resolver_addr, Duration::from_secs(2));

        let result = upstream.forward(&[0x04, 0xD2, 1, 2, 3]).await.unwrap();

        assert_eq!(expected, result);
        assert_eq!(vec![0x04, 0xD2, 1, 2, 3], server.await.unwrap());
    }

    #[tokio::test]
    async fn should_return_unreachable_when_call_forward_given_silent_resolver() {
        let resolver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let upstream = UdpUpstream::new(resolver.local_addr().unwrap(), Duration::from_millis(50));

        let result = upstream.forward(&[0u8; 12]).await;

        assert!(matches!(result, Err(DnsError::UpstreamUnreachable { .. })));
        drop(resolver);
    }
}

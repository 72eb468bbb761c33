use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;

use crate::buffer::PacketBuffer;
use crate::config::Config;
use crate::error::{DnsError, Result};

pub use forwarder::Forwarder;
pub use upstream::UdpUpstream;

mod forwarder;
mod upstream;

pub struct HandlerContext {
    main_socket: UdpSocket,
    forwarder: Forwarder,
}

impl HandlerContext {
    pub async fn from(config: &Config) -> Result<Self> {
        let main_socket = UdpSocket::bind(config.bind).await?;
        let upstream = Arc::new(UdpUpstream::new(config.resolver, config.upstream_timeout));
        let forwarder = Forwarder::new(upstream, config.merge_strategy);
        Ok(HandlerContext::new(main_socket, forwarder))
    }

    pub fn new(main_socket: UdpSocket, forwarder: Forwarder) -> Self {
        HandlerContext {
            main_socket,
            forwarder,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.main_socket.local_addr()?)
    }

    pub async fn recv_query(&self) -> Result<(PacketBuffer, SocketAddr)> {
        let mut buffer = PacketBuffer::new();
        let (len, src) = self.main_socket.recv_from(buffer.as_mut_slice()).await?;
        buffer.set_len(len);
        Ok((buffer, src))
    }

    pub async fn handle_task(&self, src: SocketAddr, buffer: PacketBuffer) -> Result<()> {
        debug!("{} bytes from {}", buffer.len(), src);
        let answer = self.forwarder.handle_client_query(buffer.as_slice()).await?;
        self.back_to_client(src, &answer).await
    }

    async fn back_to_client(&self, client: SocketAddr, answer: &[u8]) -> Result<()> {
        self.main_socket
            .send_to(answer, client)
            .await
            .map_err(|source| DnsError::SendFailure {
                addr: client,
                source,
            })?;
        Ok(())
    }

    /// Serves datagrams one at a time until the process is stopped. A bad
    /// datagram or a failed upstream only costs that one query.
    pub async fn run(&self) {
        loop {
            match self.recv_query().await {
                Ok((buffer, src)) => {
                    if let Err(e) = self.handle_task(src, buffer).await {
                        match e {
                            DnsError::UpstreamUnreachable { .. } | DnsError::SendFailure { .. } => {
                                error!("query from {} failed: {}", src, e)
                            }
                            _ => warn!("dropping datagram from {}: {}", src, e),
                        }
                    }
                }
                Err(e) => error!("error receiving query: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::net::UdpSocket;
    use tokio::time::timeout;

    use crate::config::MergeStrategy;
    use crate::error::DnsError;
    use crate::handler::{Forwarder, HandlerContext, UdpUpstream};
    use crate::protocol::tests::a_reply;
    use crate::protocol::{Header, Question};

    async fn spawn_resolver() -> std::net::SocketAddr {
        let resolver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = resolver.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            loop {
                let (_, src) = resolver.recv_from(&mut buf).await.unwrap();
                let id = u16::from_be_bytes([buf[0], buf[1]]);
                let reply = a_reply(id, "example.com", Ipv4Addr::new(93, 184, 216, 34));
                resolver.send_to(&reply, src).await.unwrap();
            }
        });
        addr
    }

    async fn spawn_server(resolver: std::net::SocketAddr) -> std::net::SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let upstream = Arc::new(UdpUpstream::new(resolver, Duration::from_secs(2)));
        let context = Arc::new(HandlerContext::new(
            socket,
            Forwarder::new(upstream, MergeStrategy::Reencode),
        ));
        let addr = context.local_addr().unwrap();
        tokio::spawn(async move { context.run().await });
        addr
    }

    fn query(id: u16) -> Vec<u8> {
        let header = Header {
            id,
            rd: true,
            question_count: 1,
            ..Default::default()
        };
        let mut bytes = header.to_bytes().to_vec();
        bytes.extend(Question::a("example.com").to_bytes().unwrap());
        bytes
    }

    #[tokio::test]
    async fn should_relay_reply_to_client_when_call_run_given_valid_query() {
        let server = spawn_server(spawn_resolver().await).await;
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        client.send_to(&query(0x04D2), server).await.unwrap();
        let mut buf = [0u8; 512];
        let (len, _) = timeout(Duration::from_secs(2), client.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            a_reply(0x04D2, "example.com", Ipv4Addr::new(93, 184, 216, 34)),
            buf[..len].to_vec()
        );
    }

    #[tokio::test]
    async fn should_keep_serving_when_call_run_given_malformed_datagram_first() {
        let server = spawn_server(spawn_resolver().await).await;
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        client.send_to(&[0x01, 0x02, 0x03], server).await.unwrap();
        client.send_to(&query(7), server).await.unwrap();
        let mut buf = [0u8; 512];
        let (len, _) = timeout(Duration::from_secs(2), client.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(7, u16::from_be_bytes([buf[0], buf[1]]));
        assert!(len > 12);
    }

    #[tokio::test]
    async fn should_return_send_failure_when_call_back_to_client_given_unreachable_family() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let upstream = Arc::new(UdpUpstream::new(
            "127.0.0.1:53".parse().unwrap(),
            Duration::from_secs(1),
        ));
        let forwarder = Forwarder::new(upstream, MergeStrategy::Reencode);
        let context = HandlerContext::new(socket, forwarder);
        // an IPv4 socket cannot send to an IPv6 peer
        let client: std::net::SocketAddr = "[::1]:5353".parse().unwrap();

        let result = context.back_to_client(client, &[1, 2, 3]).await;

        match result {
            Err(DnsError::SendFailure { addr, .. }) => assert_eq!(client, addr),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}

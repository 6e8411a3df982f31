//! 反向连接监听
//!
//! 驱动监听，机器人上的控制程序主动连入。

use crate::error::FollowerError;
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// 接受轮询间隔
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// 反向连接监听器
#[derive(Debug)]
pub struct ReverseServer {
    listener: TcpListener,
}

impl ReverseServer {
    /// 绑定监听地址（端口 0 表示由系统分配）
    pub fn bind(addr: impl ToSocketAddrs) -> Result<Self, FollowerError> {
        let listener = TcpListener::bind(addr)?;
        // 非阻塞 accept 才能做有界等待
        listener.set_nonblocking(true)?;
        info!("Reverse server listening on {}", listener.local_addr()?);
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, FollowerError> {
        Ok(self.listener.local_addr()?)
    }

    /// 等待控制程序连入，超时返回 [`FollowerError::AcceptTimeout`]
    pub fn accept(&self, timeout: Duration) -> Result<(TcpStream, SocketAddr), FollowerError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    stream.set_nonblocking(false)?;
                    debug!("Accepted reverse connection from {}", peer);
                    return Ok((stream, peer));
                },
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(FollowerError::AcceptTimeout(timeout));
                    }
                    std::thread::sleep(ACCEPT_POLL_INTERVAL);
                },
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_times_out() {
        let server = ReverseServer::bind("127.0.0.1:0").unwrap();
        let start = Instant::now();
        let result = server.accept(Duration::from_millis(30));
        assert!(matches!(result, Err(FollowerError::AcceptTimeout(_))));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_accept_connection() {
        let server = ReverseServer::bind("127.0.0.1:0").unwrap();
        let addr = server.local_addr().unwrap();
        let client = std::thread::spawn(move || TcpStream::connect(addr).unwrap());
        let (_stream, peer) = server.accept(Duration::from_secs(2)).unwrap();
        let client = client.join().unwrap();
        assert_eq!(peer, client.local_addr().unwrap());
    }
}

//! 数据包来源
//!
//! [`PacketSource`] 是接收线程与传输层之间的接缝：每次 `receive()` 返回一个
//! 完整的、按长度前缀切好的包（含前缀本身）。读取超时返回
//! [`DriverError::Timeout`]，属于正常情况。

use crate::error::DriverError;
use std::io::{ErrorKind, Read};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, trace};
use ur_protocol::LENGTH_PREFIX_SIZE;

/// 单个包允许的最大长度
///
/// 主端口的状态消息最长约数 KB，超过此值视为流已错位。
pub const MAX_PACKET_SIZE: usize = 64 * 1024;

/// 数据包来源
pub trait PacketSource {
    /// 读取下一个完整的包（阻塞，直到读超时）
    fn receive(&mut self) -> Result<Vec<u8>, DriverError>;
}

impl<S: PacketSource + ?Sized> PacketSource for Box<S> {
    fn receive(&mut self) -> Result<Vec<u8>, DriverError> {
        (**self).receive()
    }
}

/// 基于 TCP 的长度前缀包流
///
/// 读超时发生在包中间时，已读到的字节保留在内部缓冲区，下次调用继续拼接。
pub struct TcpPacketStream {
    stream: TcpStream,
    pending: Vec<u8>,
    scratch: Box<[u8]>,
}

impl TcpPacketStream {
    /// 连接到控制器端口
    pub fn connect(
        addr: impl ToSocketAddrs,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, DriverError> {
        let mut last_err = None;
        for candidate in addr.to_socket_addrs()? {
            match TcpStream::connect_timeout(&candidate, connect_timeout) {
                Ok(stream) => return Self::from_stream(stream, read_timeout),
                Err(e) => {
                    debug!("Failed to connect to {}: {}", candidate, e);
                    last_err = Some(e);
                },
            }
        }
        Err(DriverError::Io(last_err.unwrap_or_else(|| {
            std::io::Error::new(ErrorKind::AddrNotAvailable, "address resolved to nothing")
        })))
    }

    /// 包装一个已建立的连接
    pub fn from_stream(stream: TcpStream, read_timeout: Duration) -> Result<Self, DriverError> {
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(read_timeout))?;
        Ok(Self {
            stream,
            pending: Vec::with_capacity(4096),
            scratch: vec![0u8; 4096].into_boxed_slice(),
        })
    }

    pub fn peer_addr(&self) -> Result<SocketAddr, DriverError> {
        Ok(self.stream.peer_addr()?)
    }

    /// 若缓冲区中已有完整的包则取出
    fn take_packet(&mut self) -> Result<Option<Vec<u8>>, DriverError> {
        if self.pending.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }
        let mut raw = [0u8; LENGTH_PREFIX_SIZE];
        raw.copy_from_slice(&self.pending[..LENGTH_PREFIX_SIZE]);
        let declared = i32::from_be_bytes(raw);

        let len = usize::try_from(declared)
            .ok()
            .filter(|len| (LENGTH_PREFIX_SIZE..=MAX_PACKET_SIZE).contains(len))
            .ok_or(DriverError::InvalidPacketLength(declared))?;

        if self.pending.len() < len {
            return Ok(None);
        }
        let rest = self.pending.split_off(len);
        let packet = std::mem::replace(&mut self.pending, rest);
        trace!("Received packet of {} bytes", packet.len());
        Ok(Some(packet))
    }
}

impl PacketSource for TcpPacketStream {
    fn receive(&mut self) -> Result<Vec<u8>, DriverError> {
        loop {
            if let Some(packet) = self.take_packet()? {
                return Ok(packet);
            }
            match self.stream.read(&mut self.scratch) {
                Ok(0) => return Err(DriverError::ConnectionClosed),
                Ok(n) => self.pending.extend_from_slice(&self.scratch[..n]),
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(DriverError::Timeout);
                },
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(DriverError::Io(e)),
            }
        }
    }
}

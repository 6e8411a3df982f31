//! 二进制读取器
//!
//! 在固定字节缓冲区上维护一个读游标，按大端字节序（网络字节序）读取定长标量。
//! 所有越界读取都返回 [`ProtocolError::InsufficientData`]，不会 panic。

use crate::ProtocolError;

/// 可按大端字节序读取的定长标量
///
/// 为 `u8/i8/u16/i16/u32/i32/u64/i64/f32/f64/bool` 实现。
/// `bool` 在线上占 1 字节，非 0 即为 `true`。
pub trait BeScalar: Sized + Copy {
    /// 线上字节数
    const SIZE: usize;

    /// 从切片头部解码（调用方保证 `bytes.len() >= SIZE`）
    fn from_be_slice(bytes: &[u8]) -> Self;
}

macro_rules! impl_be_scalar {
    ($($t:ty),*) => {
        $(
            impl BeScalar for $t {
                const SIZE: usize = std::mem::size_of::<$t>();

                #[inline]
                fn from_be_slice(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$t>()];
                    raw.copy_from_slice(&bytes[..Self::SIZE]);
                    <$t>::from_be_bytes(raw)
                }
            }
        )*
    };
}

impl_be_scalar!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl BeScalar for bool {
    const SIZE: usize = 1;

    #[inline]
    fn from_be_slice(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

/// 大端二进制读取器
///
/// # 示例
///
/// ```
/// use ur_protocol::BinaryReader;
///
/// let buf = [0x00, 0x00, 0x00, 0x2A, 0x10];
/// let mut reader = BinaryReader::new(&buf);
///
/// assert_eq!(reader.peek::<i32>().unwrap(), 42);
/// assert_eq!(reader.parse::<i32>().unwrap(), 42);
/// assert_eq!(reader.parse::<u8>().unwrap(), 0x10);
/// assert!(reader.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BinaryReader<'a> {
    /// 创建读取器，游标位于缓冲区起点
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// 当前游标位置（已消费字节数）
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// 剩余可读字节数
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// 是否已读完
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// 检查从当前游标起是否至少还有 `n` 字节
    #[inline]
    pub fn check_size(&self, n: usize) -> bool {
        self.remaining() >= n
    }

    fn require(&self, offset: usize, n: usize) -> Result<(), ProtocolError> {
        let needed = offset + n;
        if self.check_size(needed) {
            Ok(())
        } else {
            Err(ProtocolError::InsufficientData {
                needed,
                remaining: self.remaining(),
            })
        }
    }

    /// 读取一个标量但不移动游标
    #[inline]
    pub fn peek<T: BeScalar>(&self) -> Result<T, ProtocolError> {
        self.peek_at(0)
    }

    /// 读取游标后 `offset` 字节处的标量，不移动游标
    pub fn peek_at<T: BeScalar>(&self, offset: usize) -> Result<T, ProtocolError> {
        self.require(offset, T::SIZE)?;
        let start = self.pos + offset;
        Ok(T::from_be_slice(&self.buf[start..start + T::SIZE]))
    }

    /// 读取一个标量并移动游标
    #[inline]
    pub fn parse<T: BeScalar>(&mut self) -> Result<T, ProtocolError> {
        let value = self.peek::<T>()?;
        self.pos += T::SIZE;
        Ok(value)
    }

    /// 连续读取 `N` 个同类标量
    pub fn parse_array<T: BeScalar + Default, const N: usize>(
        &mut self,
    ) -> Result<[T; N], ProtocolError> {
        // 先整体检查，失败时游标保持不动
        self.require(0, T::SIZE * N)?;
        let mut out = [T::default(); N];
        for slot in out.iter_mut() {
            *slot = self.parse()?;
        }
        Ok(out)
    }

    /// 跳过 `n` 字节
    pub fn consume(&mut self, n: usize) -> Result<(), ProtocolError> {
        self.require(0, n)?;
        self.pos += n;
        Ok(())
    }

    /// 读取 `n` 字节原始数据
    pub fn parse_bytes(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        self.require(0, n)?;
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// 读取剩余全部字节
    pub fn parse_remainder(&mut self) -> &'a [u8] {
        let bytes = &self.buf[self.pos..];
        self.pos = self.buf.len();
        bytes
    }

    /// 切出一个只覆盖接下来 `n` 字节的子读取器，并把本读取器的游标移过这 `n` 字节
    ///
    /// 子读取器无法越过 `n` 字节的边界，用于把版本化解码器限制在声明的包长度内。
    pub fn take(&mut self, n: usize) -> Result<BinaryReader<'a>, ProtocolError> {
        let bytes = self.parse_bytes(n)?;
        Ok(BinaryReader::new(bytes))
    }
}

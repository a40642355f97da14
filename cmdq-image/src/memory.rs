//! メモリイメージへのアクセス

use crate::{hexdump, ImageError, Result};
use cmdq_layout::DecodeError;
use std::fs;
use std::path::Path;

/// メモリから読み取り可能な型
pub trait MemoryReadable: Sized {
    /// リトルエンディアンのバイト配列から値を構築
    ///
    /// `bytes` の長さが `size()` と異なる場合は `None`。
    fn from_le_bytes(bytes: &[u8]) -> Option<Self>;

    /// 型のサイズ（バイト数）
    fn size() -> usize;
}

macro_rules! impl_memory_readable {
    ($($ty:ty),*) => {
        $(
            impl MemoryReadable for $ty {
                fn from_le_bytes(bytes: &[u8]) -> Option<Self> {
                    Some(<$ty>::from_le_bytes(bytes.try_into().ok()?))
                }

                fn size() -> usize {
                    std::mem::size_of::<$ty>()
                }
            }
        )*
    };
}

impl_memory_readable!(u8, u16, u32, u64, i32);

/// キャプチャしたメモリの窓
///
/// `[base, base + len)` の範囲だけが読み取れます。イメージは読み込み後に変更されないので、
/// 複数のデコーダから同時に参照できます。
#[derive(Debug, Clone)]
pub struct MemoryImage {
    base: u64,
    data: Vec<u8>,
}

impl MemoryImage {
    /// バイト列からイメージを作成する
    pub fn new(base: u64, data: Vec<u8>) -> Result<Self> {
        if base.checked_add(data.len() as u64).is_none() {
            return Err(ImageError::AddressOverflow {
                base,
                len: data.len(),
            });
        }
        Ok(Self { base, data })
    }

    /// 生のバイナリファイルを読み込む
    pub fn from_file(path: impl AsRef<Path>, base: u64) -> Result<Self> {
        let data = fs::read(path)?;
        Self::new(base, data)
    }

    /// テキストのhexdumpからイメージを作成する
    pub fn from_hexdump(text: &str, base: u64) -> Result<Self> {
        Self::new(base, hexdump::parse(text)?)
    }

    /// hexdumpファイルを読み込む
    pub fn from_hexdump_file(path: impl AsRef<Path>, base: u64) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_hexdump(&text, base)
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 終端アドレス（この値自体は含まない）
    pub fn end(&self) -> u64 {
        self.base + self.data.len() as u64
    }

    /// アドレスをイメージ先頭からのオフセットに変換する
    pub fn offset_of(&self, address: u64) -> Option<usize> {
        let offset = address.checked_sub(self.base)?;
        (offset < self.data.len() as u64).then_some(offset as usize)
    }

    /// `address` から `size` バイトがすべてイメージ内にあるか
    pub fn contains(&self, address: u64, size: usize) -> bool {
        self.range(address, size).is_some()
    }

    /// メモリからデータを読み取る
    pub fn read(&self, address: u64, size: usize) -> Result<&[u8]> {
        let (start, end) = self
            .range(address, size)
            .ok_or(ImageError::OutOfBounds { address, size })?;
        Ok(&self.data[start..end])
    }

    /// 型付き値を読み取る（ジェネリック版）
    ///
    /// # Examples
    /// ```ignore
    /// let value: u64 = image.read_typed(addr)?;
    /// let value: u32 = image.read_typed(addr)?;
    /// ```
    pub fn read_typed<T: MemoryReadable>(&self, address: u64) -> Result<T> {
        let bytes = self.read(address, T::size())?;
        T::from_le_bytes(bytes).ok_or(ImageError::OutOfBounds {
            address,
            size: T::size(),
        })
    }

    /// u64値を読み取る（リトルエンディアン）
    pub fn read_u64(&self, address: u64) -> Result<u64> {
        self.read_typed(address)
    }

    /// u32値を読み取る（リトルエンディアン）
    pub fn read_u32(&self, address: u64) -> Result<u32> {
        self.read_typed(address)
    }

    /// 範囲 `[address, address + size)` をデータ内のオフセットに変換する
    ///
    /// 空の範囲はイメージ内（終端を含む）にあるときだけ有効です。
    fn range(&self, address: u64, size: usize) -> Option<(usize, usize)> {
        let start = address.checked_sub(self.base)?;
        let end = start.checked_add(size as u64)?;
        if end > self.data.len() as u64 {
            return None;
        }
        Some((start as usize, end as usize))
    }
}

/// cmdq_layoutのMemoryReaderトレイトを実装
impl cmdq_layout::MemoryReader for MemoryImage {
    fn read(&self, address: u64, size: usize) -> cmdq_layout::Result<Vec<u8>> {
        self.read(address, size)
            .map(<[u8]>::to_vec)
            .map_err(|_| DecodeError::OutOfBounds { address, size })
    }

    fn contains(&self, address: u64, size: usize) -> bool {
        self.contains(address, size)
    }

    fn read_u32(&self, address: u64) -> cmdq_layout::Result<u32> {
        self.read_u32(address)
            .map_err(|_| DecodeError::OutOfBounds { address, size: 4 })
    }

    fn read_u64(&self, address: u64) -> cmdq_layout::Result<u64> {
        self.read_u64(address)
            .map_err(|_| DecodeError::OutOfBounds { address, size: 8 })
    }
}

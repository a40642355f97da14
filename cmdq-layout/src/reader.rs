//! メモリ読み取りトレイト
//!
//! キャプチャしたメモリイメージへのアクセスを抽象化します。

use crate::Result;

/// メモリ読み取りトレイト
///
/// 実装は読み取り専用で、複数スレッドから同時に参照されても問題ないものとします。
pub trait MemoryReader: Send + Sync {
    /// `address` から `size` バイトを読み取る
    ///
    /// 範囲の一部でもイメージ外なら `DecodeError::OutOfBounds` を返します。
    fn read(&self, address: u64, size: usize) -> Result<Vec<u8>>;

    /// `address` から `size` バイトがすべてイメージ内にあるか
    fn contains(&self, address: u64, size: usize) -> bool;

    fn read_u32(&self, address: u64) -> Result<u32> {
        let bytes = self.read(address, 4)?;
        Ok(le_uint(&bytes) as u32)
    }

    fn read_u64(&self, address: u64) -> Result<u64> {
        let bytes = self.read(address, 8)?;
        Ok(le_uint(&bytes))
    }

    /// `width` バイト（最大8）の符号なし整数を読み取る
    fn read_uint(&self, address: u64, width: usize) -> Result<u64> {
        let bytes = self.read(address, width.min(8))?;
        Ok(le_uint(&bytes))
    }
}

/// 最大8バイトのリトルエンディアン符号なし整数を組み立てる
pub(crate) fn le_uint(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .take(8)
        .rev()
        .fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

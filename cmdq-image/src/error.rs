//! メモリイメージのエラー型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    /// 読み取り範囲がイメージ外
    #[error("address range {address:#x}+{size:#x} is outside the memory image")]
    OutOfBounds { address: u64, size: usize },

    /// ベースアドレスと長さの和が64bitを越える
    #[error("image of {len:#x} bytes at {base:#x} overflows the address space")]
    AddressOverflow { base: u64, len: usize },

    #[error("malformed hexdump at line {line}: {message}")]
    Hexdump { line: usize, message: String },

    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),
}

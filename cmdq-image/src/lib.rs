//! cmdq メモリイメージ
//!
//! このクレートは、キャプチャしたGPU共有メモリの窓（ベースアドレスとバイト列）を提供します。
//! 生のバイナリと、ファームウェアツールが出力するテキストのhexdumpの両方を読み込めます。

pub mod error;
pub mod hexdump;
pub mod memory;

pub use error::ImageError;
pub use memory::{MemoryImage, MemoryReadable};

/// メモリイメージの結果型
pub type Result<T> = std::result::Result<T, ImageError>;

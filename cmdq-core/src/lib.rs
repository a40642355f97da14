//! cmdq のコア機能
//!
//! このクレートは、メモリイメージとスキーマカタログを束ねたセッションと、
//! 対話シェルのコマンド解析を提供します。

pub mod command;
pub mod errors;
pub mod parse;
pub mod session;

pub use command::Command;
pub use session::Session;

// 他のクレートから使用するために再エクスポート
pub use cmdq_image::MemoryImage;
pub use cmdq_layout::{DecodeError, DecodedField, DecodedRecord, DecodedValue, PointerOutcome, PointerResult, RecordKind};

/// セッションの結果型
pub type Result<T> = anyhow::Result<T>;

//! cmdq レイアウト記述とデコーダ
//!
//! このクレートは、GPUファームウェアと共有するメモリ上のレコードを宣言的なスキーマで記述し、
//! メモリイメージからデコード済みのツリーを組み立てる機能を提供します。
//! ポインタは範囲チェックと循環参照検出を行いながら辿ります。

pub mod catalog;
pub mod controllist;
pub mod decode;
pub mod error;
pub mod reader;
pub mod registry;
pub mod schema;
pub mod value;
pub mod variant;

pub use catalog::{build_catalog, queue_type_name, CMD_BUF_WORK, COMMAND_QUEUE_INFO, NOTIFY_CMD_QUEUE_WORK};
pub use controllist::{ControlListDecoder, OpaqueControlList};
pub use decode::{DecodeConfig, DecodePath, Decoder};
pub use error::{DecodeError, SchemaError};
pub use reader::MemoryReader;
pub use registry::SchemaRegistry;
pub use schema::{FieldDescriptor, FieldKind, LayoutEntry, PointerTarget, RecordBuilder, RecordSchema};
pub use value::{DecodedField, DecodedRecord, DecodedValue, PointerOutcome, PointerResult, RecordKind};
pub use variant::{DiscriminantLayout, DiscriminantWidth, UnknownPolicy, VariantTable};

use once_cell::sync::Lazy;
use tracing::error;

/// デコードの結果型
pub type Result<T> = std::result::Result<T, DecodeError>;

static CATALOG: Lazy<SchemaRegistry> = Lazy::new(|| {
    build_catalog().unwrap_or_else(|e| {
        // 組み込みの定義が壊れている場合は空のレジストリで続行する
        error!("failed to build schema catalog: {}", e);
        SchemaRegistry::new()
    })
});

/// 組み込みのAGXスキーマカタログ
///
/// 初回呼び出し時に一度だけ構築され、以降は同じレジストリを共有します。
pub fn catalog() -> &'static SchemaRegistry {
    &CATALOG
}

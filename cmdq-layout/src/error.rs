//! デコードおよびスキーマ構築のエラー型

use serde::Serialize;
use thiserror::Error;

/// デコード時のエラー
///
/// `TruncatedData` と `SchemaMismatch` は、その時点で組み立て中のレコードを失敗させます。
/// ポインタ経由で到達したレコードの失敗は親には伝播せず、ポインタフィールドの
/// `PointerOutcome::Invalid` として記録されます。
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum DecodeError {
    /// レコード全体を読むのに必要なバイトがイメージ内にない
    #[error("truncated data: {schema} at {address:#x} needs {needed:#x} bytes")]
    TruncatedData {
        schema: String,
        address: u64,
        needed: usize,
    },

    /// 定数フィールドの値が期待値と異なる
    #[error(
        "schema mismatch: {schema}.{field} at {address:#x} expected {expected:#x}, found {found:#x}"
    )]
    SchemaMismatch {
        schema: String,
        address: u64,
        field: String,
        expected: u32,
        found: u32,
    },

    /// アドレス範囲がイメージ外
    #[error("address range {address:#x}+{size:#x} is outside the memory image")]
    OutOfBounds { address: u64, size: usize },

    /// レジストリに存在しないレコード名
    #[error("unknown record schema '{0}'")]
    UnknownSchema(String),

    /// レジストリに存在しないvariantテーブル名
    #[error("unknown variant table '{0}'")]
    UnknownVariantTable(String),

    /// control listのサイズフィールドが同じレコード内に見つからない
    #[error("{schema} has no u32 size field '{field}' for its control list")]
    MissingSizeField { schema: String, field: String },
}

/// スキーマレジストリ構築時のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("schema '{0}' is registered twice")]
    Duplicate(String),

    #[error("{schema}.{field} points to unknown schema '{target}'")]
    DanglingTarget {
        schema: String,
        field: String,
        target: String,
    },

    #[error("variant table {table} maps {discriminant:#x} to unknown schema '{target}'")]
    DanglingVariant {
        table: String,
        discriminant: u64,
        target: String,
    },

    #[error(
        "variant table {table} maps {discriminant:#x} to {schema}, whose leading constant is {leading:?}"
    )]
    VariantTagMismatch {
        table: String,
        discriminant: u64,
        schema: String,
        leading: Option<u32>,
    },

    #[error("{schema} declares {declared:#x} bytes but its layout covers {computed:#x}")]
    SizeMismatch {
        schema: String,
        declared: usize,
        computed: usize,
    },

    #[error("{schema}.{field} names size field '{size_field}', which is not a u32 field of the record")]
    BadSizeField {
        schema: String,
        field: String,
        size_field: String,
    },
}

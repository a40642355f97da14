//! デコード結果のツリー
//!
//! `DecodedRecord` はデコーダだけが生成し、生成後は変更されません。
//! ネストしたレコードとポインタ先のレコードは親が排他的に所有します。

use crate::DecodeError;
use serde::Serialize;
use std::fmt;

/// レコードがどの経路でデコードされたか
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordKind {
    /// 固定レイアウト
    Fixed,
    /// variantテーブルで振り分けられた
    Variant { discriminant: u64 },
    /// テーブルにない判別値
    UnknownVariant { discriminant: u64 },
    /// control listデコーダなど外部のデコーダが生成した
    External,
}

/// デコード済みレコード
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedRecord {
    /// スキーマ名
    pub schema: String,
    /// レコード先頭のアドレス
    pub address: u64,
    pub kind: RecordKind,
    /// 宣言順のフィールド（パディングは含まない）
    pub fields: Vec<DecodedField>,
}

/// 名前付きフィールド値
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedField {
    pub name: String,
    pub value: DecodedValue,
}

/// フィールド値
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodedValue {
    U32(u32),
    U64(u64),
    I32(i32),
    /// 解釈しない生バイト列
    Bytes(Vec<u8>),
    /// インラインのレコード
    Record(DecodedRecord),
    Pointer(PointerResult),
}

/// ポインタフィールドの解決結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointerResult {
    /// ポインタの生の値
    pub target: u64,
    pub outcome: PointerOutcome,
}

/// ポインタの解決状態
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum PointerOutcome {
    Resolved(Box<DecodedRecord>),
    /// 値が0（フィールドが存在しない）
    Null,
    /// 参照先の範囲がイメージ外
    OutOfBounds,
    /// 参照先が現在のデコード経路上にある
    CycleDetected,
    /// 最大深さに達したため辿らなかった
    DepthLimit,
    /// 参照先のデコードが失敗した
    Invalid(DecodeError),
}

impl PointerOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, PointerOutcome::Resolved(_))
    }

    /// ログ・表示用の短い名前
    pub fn label(&self) -> &'static str {
        match self {
            PointerOutcome::Resolved(_) => "resolved",
            PointerOutcome::Null => "null",
            PointerOutcome::OutOfBounds => "out of bounds",
            PointerOutcome::CycleDetected => "cycle",
            PointerOutcome::DepthLimit => "depth limit",
            PointerOutcome::Invalid(_) => "invalid",
        }
    }
}

impl DecodedRecord {
    /// フィールド値を名前で取得する
    pub fn get(&self, name: &str) -> Option<&DecodedValue> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.value)
    }

    pub fn u32(&self, name: &str) -> Option<u32> {
        match self.get(name)? {
            DecodedValue::U32(v) => Some(*v),
            _ => None,
        }
    }

    /// u64フィールド、またはポインタフィールドの生の値
    pub fn u64(&self, name: &str) -> Option<u64> {
        match self.get(name)? {
            DecodedValue::U64(v) => Some(*v),
            DecodedValue::Pointer(p) => Some(p.target),
            _ => None,
        }
    }

    pub fn i32(&self, name: &str) -> Option<i32> {
        match self.get(name)? {
            DecodedValue::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn bytes(&self, name: &str) -> Option<&[u8]> {
        match self.get(name)? {
            DecodedValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn pointer(&self, name: &str) -> Option<&PointerResult> {
        match self.get(name)? {
            DecodedValue::Pointer(p) => Some(p),
            _ => None,
        }
    }

    /// インラインのレコード
    pub fn nested(&self, name: &str) -> Option<&DecodedRecord> {
        match self.get(name)? {
            DecodedValue::Record(r) => Some(r),
            _ => None,
        }
    }

    /// ポインタ先のデコード済みレコード
    pub fn resolved(&self, name: &str) -> Option<&DecodedRecord> {
        match &self.pointer(name)?.outcome {
            PointerOutcome::Resolved(r) => Some(r),
            _ => None,
        }
    }

    /// 解決できなかったポインタを深さ優先で列挙する
    ///
    /// パスは `field.field` 形式で、`Null` は含みません。
    pub fn unresolved_pointers(&self) -> Vec<(String, &PointerResult)> {
        let mut out = Vec::new();
        self.collect_unresolved("", &mut out);
        out
    }

    fn collect_unresolved<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a PointerResult)>) {
        for field in &self.fields {
            let path = if prefix.is_empty() {
                field.name.clone()
            } else {
                format!("{}.{}", prefix, field.name)
            };
            match &field.value {
                DecodedValue::Record(inner) => inner.collect_unresolved(&path, out),
                DecodedValue::Pointer(p) => match &p.outcome {
                    PointerOutcome::Resolved(inner) => inner.collect_unresolved(&path, out),
                    PointerOutcome::Null => {}
                    _ => out.push((path, p)),
                },
                _ => {}
            }
        }
    }
}

impl fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodedValue::U32(v) => write!(f, "{:#x}", v),
            DecodedValue::U64(v) => write!(f, "{:#x}", v),
            DecodedValue::I32(v) => write!(f, "{}", v),
            DecodedValue::Bytes(bytes) => {
                write!(f, "[")?;
                for (i, b) in bytes.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{:02x}", b)?;
                }
                write!(f, "]")
            }
            DecodedValue::Record(r) => write!(f, "{} @ {:#x}", r.schema, r.address),
            DecodedValue::Pointer(p) => write!(f, "{}", p),
        }
    }
}

impl fmt::Display for PointerResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.outcome {
            PointerOutcome::Resolved(r) => write!(f, "{:#x} -> {}", self.target, r.schema),
            PointerOutcome::Null => write!(f, "null"),
            PointerOutcome::Invalid(e) => write!(f, "{:#x} <invalid: {}>", self.target, e),
            other => write!(f, "{:#x} <{}>", self.target, other.label()),
        }
    }
}

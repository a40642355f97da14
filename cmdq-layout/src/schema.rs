//! レコードスキーマ
//!
//! 固定オフセットのフィールド列と明示的なパディングでレコードのレイアウトを記述します。

use crate::SchemaError;
use std::sync::Arc;

/// ポインタ値のバイト数（アドレスはすべて64bit）
pub const POINTER_SIZE: usize = 8;

/// ポインタの参照先
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerTarget {
    /// 固定レイアウトのレコード（レジストリ上の名前）
    Record(String),
    /// variantテーブル（レジストリ上の名前）
    Variants(String),
    /// 外部のcontrol listデコーダに渡す領域
    ///
    /// 長さは同じレコード内のu32フィールド `size_field` から取ります。
    ControlList { size_field: String },
}

/// フィールドの種類
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    U32,
    U64,
    I32,
    /// 値が一致しなければ `SchemaMismatch`
    ConstU32(u32),
    /// 解釈しない生バイト列
    Bytes(usize),
    Pointer(PointerTarget),
    /// インラインに埋め込まれたレコード
    Nested(Arc<RecordSchema>),
}

impl FieldKind {
    /// レコード内で占めるバイト数
    pub fn size(&self) -> usize {
        match self {
            FieldKind::U32 | FieldKind::I32 | FieldKind::ConstU32(_) => 4,
            FieldKind::U64 => 8,
            FieldKind::Bytes(n) => *n,
            FieldKind::Pointer(_) => POINTER_SIZE,
            FieldKind::Nested(schema) => schema.size(),
        }
    }
}

/// フィールド記述子
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
}

/// レイアウトの要素
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutEntry {
    Field(FieldDescriptor),
    /// フィールドを生成せずにカーソルだけ進める
    Padding(usize),
}

impl LayoutEntry {
    pub fn size(&self) -> usize {
        match self {
            LayoutEntry::Field(field) => field.kind.size(),
            LayoutEntry::Padding(n) => *n,
        }
    }
}

/// レコードスキーマ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    name: String,
    entries: Vec<LayoutEntry>,
    size: usize,
}

impl RecordSchema {
    /// ビルダーを作成する
    pub fn builder(name: impl Into<String>) -> RecordBuilder {
        RecordBuilder {
            name: name.into(),
            entries: Vec::new(),
            offset: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[LayoutEntry] {
        &self.entries
    }

    /// レコード全体のバイト数（フィールドとパディングの合計）
    pub fn size(&self) -> usize {
        self.size
    }

    /// フィールドをオフセット付きで列挙する
    pub fn fields(&self) -> impl Iterator<Item = (usize, &FieldDescriptor)> + '_ {
        self.entries
            .iter()
            .scan(0usize, |offset, entry| {
                let at = *offset;
                *offset += entry.size();
                Some((at, entry))
            })
            .filter_map(|(at, entry)| match entry {
                LayoutEntry::Field(field) => Some((at, field)),
                LayoutEntry::Padding(_) => None,
            })
    }

    /// 名前でフィールドを探す
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields().map(|(_, f)| f).find(|f| f.name == name)
    }

    /// フィールドのオフセット
    pub fn field_offset(&self, name: &str) -> Option<usize> {
        self.fields().find(|(_, f)| f.name == name).map(|(at, _)| at)
    }

    /// 先頭フィールドが `ConstU32` ならその値
    ///
    /// variantテーブルの判別値との一致確認に使います。
    pub fn leading_const(&self) -> Option<u32> {
        match self.fields().next() {
            Some((0, FieldDescriptor {
                kind: FieldKind::ConstU32(value),
                ..
            })) => Some(*value),
            _ => None,
        }
    }

    /// 外部へのポインタを持たないか
    pub fn is_leaf(&self) -> bool {
        self.fields().all(|(_, f)| match &f.kind {
            FieldKind::Pointer(_) => false,
            FieldKind::Nested(inner) => inner.is_leaf(),
            _ => true,
        })
    }
}

/// `RecordSchema` のビルダー
///
/// フィールドは宣言順に並び、オフセットは直前までのサイズの合計になります。
#[derive(Debug)]
pub struct RecordBuilder {
    name: String,
    entries: Vec<LayoutEntry>,
    offset: usize,
}

impl RecordBuilder {
    /// 任意の種類のフィールドを追加する
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.offset += kind.size();
        self.entries.push(LayoutEntry::Field(FieldDescriptor {
            name: name.into(),
            kind,
        }));
        self
    }

    pub fn u32(self, name: impl Into<String>) -> Self {
        self.field(name, FieldKind::U32)
    }

    pub fn u64(self, name: impl Into<String>) -> Self {
        self.field(name, FieldKind::U64)
    }

    pub fn i32(self, name: impl Into<String>) -> Self {
        self.field(name, FieldKind::I32)
    }

    pub fn const_u32(self, name: impl Into<String>, value: u32) -> Self {
        self.field(name, FieldKind::ConstU32(value))
    }

    pub fn bytes(self, name: impl Into<String>, len: usize) -> Self {
        self.field(name, FieldKind::Bytes(len))
    }

    /// 固定レイアウトのレコードを指すポインタ
    pub fn record_ptr(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.field(name, FieldKind::Pointer(PointerTarget::Record(target.into())))
    }

    /// variantテーブルで振り分けるレコードを指すポインタ
    pub fn variants_ptr(self, name: impl Into<String>, table: impl Into<String>) -> Self {
        self.field(name, FieldKind::Pointer(PointerTarget::Variants(table.into())))
    }

    /// control listへのポインタ（長さは `size_field` から取る）
    pub fn control_list(self, name: impl Into<String>, size_field: impl Into<String>) -> Self {
        self.field(
            name,
            FieldKind::Pointer(PointerTarget::ControlList {
                size_field: size_field.into(),
            }),
        )
    }

    pub fn nested(self, name: impl Into<String>, schema: Arc<RecordSchema>) -> Self {
        self.field(name, FieldKind::Nested(schema))
    }

    pub fn padding(mut self, len: usize) -> Self {
        self.offset += len;
        self.entries.push(LayoutEntry::Padding(len));
        self
    }

    /// 次のフィールドが `offset` から始まるようにパディングする
    ///
    /// 既に `offset` を越えている場合は何もしません（`build_sized` で検出されます）。
    pub fn pad_to(self, offset: usize) -> Self {
        match offset.checked_sub(self.offset) {
            Some(len) if len > 0 => self.padding(len),
            _ => self,
        }
    }

    /// 現在のオフセット
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn build(self) -> RecordSchema {
        RecordSchema {
            name: self.name,
            entries: self.entries,
            size: self.offset,
        }
    }

    /// 宣言したサイズとレイアウトの合計が一致することを確認して構築する
    pub fn build_sized(self, declared: usize) -> Result<RecordSchema, SchemaError> {
        if self.offset != declared {
            return Err(SchemaError::SizeMismatch {
                schema: self.name,
                declared,
                computed: self.offset,
            });
        }
        Ok(self.build())
    }
}

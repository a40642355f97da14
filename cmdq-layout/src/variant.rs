//! Variantテーブル（判別値によるレイアウトの振り分け）

use crate::schema::RecordSchema;
use std::collections::BTreeMap;
use std::sync::Arc;

/// 判別値の幅
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscriminantWidth {
    U8,
    U16,
    U32,
    U64,
}

impl DiscriminantWidth {
    pub fn bytes(self) -> usize {
        match self {
            DiscriminantWidth::U8 => 1,
            DiscriminantWidth::U16 => 2,
            DiscriminantWidth::U32 => 4,
            DiscriminantWidth::U64 => 8,
        }
    }
}

/// Discriminant情報
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscriminantLayout {
    /// フレーム先頭からのオフセット（バイト）
    pub offset: usize,
    /// 符号なし、リトルエンディアン
    pub width: DiscriminantWidth,
}

impl DiscriminantLayout {
    /// 先頭4バイトのu32
    pub const LEADING_U32: DiscriminantLayout = DiscriminantLayout {
        offset: 0,
        width: DiscriminantWidth::U32,
    };

    /// 判別値を読むのに必要なフレーム長
    pub fn end(&self) -> usize {
        self.offset + self.width.bytes()
    }
}

/// 未知の判別値の扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownPolicy {
    /// フレーム先頭 `size` バイトを生バイト列として保持する
    Opaque { size: usize },
    /// フレーム先頭から `count` 個のu32ワードを保持する
    Words { count: usize },
}

/// Variantテーブル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantTable {
    name: String,
    layout: DiscriminantLayout,
    variants: BTreeMap<u64, String>,
    policy: UnknownPolicy,
    unknown: Arc<RecordSchema>,
}

impl VariantTable {
    /// 空のテーブルを作成する
    ///
    /// 未知の判別値は `Unknown<name>` という名前で先頭8ワードを保持します。
    pub fn new(name: impl Into<String>, layout: DiscriminantLayout) -> Self {
        let name = name.into();
        let policy = UnknownPolicy::Words { count: 8 };
        let unknown = Arc::new(unknown_schema(&format!("Unknown{}", name), layout, policy));
        Self {
            name,
            layout,
            variants: BTreeMap::new(),
            policy,
            unknown,
        }
    }

    /// 判別値 `discriminant` をレコード `schema` に対応付ける
    pub fn variant(mut self, discriminant: u64, schema: impl Into<String>) -> Self {
        self.variants.insert(discriminant, schema.into());
        self
    }

    /// 未知の判別値に使うレコード名とポリシーを設定する
    pub fn unknown(mut self, name: impl Into<String>, policy: UnknownPolicy) -> Self {
        self.policy = policy;
        self.unknown = Arc::new(unknown_schema(&name.into(), self.layout, policy));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> DiscriminantLayout {
        self.layout
    }

    pub fn policy(&self) -> UnknownPolicy {
        self.policy
    }

    /// 判別値に対応するレコード名
    pub fn lookup(&self, discriminant: u64) -> Option<&str> {
        self.variants.get(&discriminant).map(String::as_str)
    }

    pub fn variants(&self) -> impl Iterator<Item = (u64, &str)> + '_ {
        self.variants.iter().map(|(d, s)| (*d, s.as_str()))
    }

    /// 未知の判別値をデコードするためのスキーマ
    pub fn unknown_schema(&self) -> &Arc<RecordSchema> {
        &self.unknown
    }
}

fn unknown_schema(name: &str, layout: DiscriminantLayout, policy: UnknownPolicy) -> RecordSchema {
    match policy {
        UnknownPolicy::Opaque { size } => RecordSchema::builder(name)
            .bytes("raw", size.max(layout.end()))
            .build(),
        UnknownPolicy::Words { count } => {
            let words = count.max(layout.end().div_ceil(4));
            (0..words)
                .map(|i| i * 4)
                .fold(RecordSchema::builder(name), |builder, offset| {
                    if offset == layout.offset {
                        builder.u32("discriminant")
                    } else {
                        builder.u32(format!("unk_{:x}", offset))
                    }
                })
                .build()
        }
    }
}

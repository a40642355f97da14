//! レコードデコーダ
//!
//! アドレスとスキーマ（またはvariantテーブル）から `DecodedRecord` のツリーを組み立てます。
//! ポインタは範囲チェックと循環チェックを通ったものだけを再帰的に辿ります。

use crate::controllist::{ControlListDecoder, OpaqueControlList};
use crate::reader::{le_uint, MemoryReader};
use crate::registry::SchemaRegistry;
use crate::schema::{FieldKind, LayoutEntry, PointerTarget, RecordSchema, POINTER_SIZE};
use crate::value::{DecodedField, DecodedRecord, DecodedValue, PointerOutcome, PointerResult, RecordKind};
use crate::variant::VariantTable;
use crate::{DecodeError, Result};
use std::collections::HashSet;
use tracing::{debug, trace, warn};

static OPAQUE_CONTROL_LIST: OpaqueControlList = OpaqueControlList;

/// デコード設定
#[derive(Debug, Clone)]
pub struct DecodeConfig {
    /// ポインタを辿る最大深さ（ルートを1と数える）
    pub max_depth: usize,
    /// `OpaqueControlList` が保持する最大バイト数
    pub max_control_list_bytes: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            max_depth: 16,
            max_control_list_bytes: 0x1_0000,
        }
    }
}

/// 現在デコード中のアドレス（循環参照検出用）
///
/// 呼び出しごとの経路だけを保持し、結果のキャッシュは持ちません。
#[derive(Debug, Clone, Default)]
pub struct DecodePath {
    active: HashSet<u64>,
}

impl DecodePath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, address: u64) -> bool {
        self.active.contains(&address)
    }

    /// 辿っている途中のレコード数
    ///
    /// 同じアドレスは二度入らないので、循環チェックを深さチェックより先に行う限り
    /// 再帰の深さと一致します。
    pub fn depth(&self) -> usize {
        self.active.len()
    }

    fn enter(&mut self, address: u64) {
        self.active.insert(address);
    }

    fn leave(&mut self, address: u64) {
        self.active.remove(&address);
    }
}

/// レコードデコーダ
///
/// メモリとレジストリへの共有参照だけを持つので、同じイメージに対して
/// 複数スレッドから同時にデコードできます。
pub struct Decoder<'a> {
    memory: &'a dyn MemoryReader,
    registry: &'a SchemaRegistry,
    control_lists: &'a dyn ControlListDecoder,
    config: DecodeConfig,
}

impl<'a> Decoder<'a> {
    /// 新しいデコーダを作成する
    ///
    /// Control listは `OpaqueControlList` で保持します。
    pub fn new(memory: &'a dyn MemoryReader, registry: &'a SchemaRegistry) -> Self {
        Self {
            memory,
            registry,
            control_lists: &OPAQUE_CONTROL_LIST,
            config: DecodeConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DecodeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_control_lists(mut self, control_lists: &'a dyn ControlListDecoder) -> Self {
        self.control_lists = control_lists;
        self
    }

    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }

    pub fn memory(&self) -> &'a dyn MemoryReader {
        self.memory
    }

    pub fn registry(&self) -> &'a SchemaRegistry {
        self.registry
    }

    /// 登録済みの固定レイアウトでデコードする
    pub fn decode_record(&self, schema: &str, address: u64) -> Result<DecodedRecord> {
        let schema = self.registry.record(schema)?;
        self.decode_with(schema, address)
    }

    /// レジストリ外のスキーマでデコードする
    pub fn decode_with(&self, schema: &RecordSchema, address: u64) -> Result<DecodedRecord> {
        let mut path = DecodePath::new();
        path.enter(address);
        self.decode_fixed(schema, address, RecordKind::Fixed, &mut path)
    }

    /// variantテーブルで振り分けてデコードする
    pub fn decode_variant(&self, table: &str, address: u64) -> Result<DecodedRecord> {
        let table = self.registry.table(table)?;
        let mut path = DecodePath::new();
        path.enter(address);
        self.decode_dispatch(table, address, &mut path)
    }

    /// 名前がテーブルならvariantとして、そうでなければ固定レイアウトとしてデコードする
    pub fn decode_any(&self, name: &str, address: u64) -> Result<DecodedRecord> {
        if self.registry.is_table(name) {
            self.decode_variant(name, address)
        } else {
            self.decode_record(name, address)
        }
    }

    /// 固定レイアウトのレコードを指すポインタを解決する
    pub fn resolve_record(&self, schema: &str, pointer: u64, path: &mut DecodePath) -> PointerResult {
        let schema = self.registry.record(schema);
        let span = schema.as_ref().map(|s| s.size()).map_err(Clone::clone);
        self.follow(pointer, span, path, |path| {
            self.decode_fixed(schema?, pointer, RecordKind::Fixed, path)
        })
    }

    /// variantテーブルで振り分けるレコードを指すポインタを解決する
    pub fn resolve_variants(&self, table: &str, pointer: u64, path: &mut DecodePath) -> PointerResult {
        let table = self.registry.table(table);
        let span = table
            .as_ref()
            .map(|t| self.registry.min_frame(t))
            .map_err(Clone::clone);
        self.follow(pointer, span, path, |path| {
            self.decode_dispatch(table?, pointer, path)
        })
    }

    /// Control listを指すポインタを解決する
    pub fn resolve_control_list(&self, pointer: u64, size: u32, path: &mut DecodePath) -> PointerResult {
        self.follow(pointer, Ok(size as usize), path, |path| {
            self.control_lists.decode(self, path, pointer, size)
        })
    }

    /// null・範囲・循環・深さの順にチェックしてから `decode` を呼ぶ
    fn follow<F>(&self, pointer: u64, span: Result<usize>, path: &mut DecodePath, decode: F) -> PointerResult
    where
        F: FnOnce(&mut DecodePath) -> Result<DecodedRecord>,
    {
        let outcome = if pointer == 0 {
            PointerOutcome::Null
        } else {
            match span {
                Err(e) => PointerOutcome::Invalid(e),
                Ok(span) if !self.memory.contains(pointer, span) => PointerOutcome::OutOfBounds,
                Ok(_) if path.contains(pointer) => PointerOutcome::CycleDetected,
                Ok(_) if path.depth() >= self.config.max_depth => PointerOutcome::DepthLimit,
                Ok(_) => {
                    path.enter(pointer);
                    let result = decode(path);
                    path.leave(pointer);
                    match result {
                        Ok(record) => PointerOutcome::Resolved(Box::new(record)),
                        Err(e) => {
                            warn!("pointee at 0x{:x} failed to decode: {}", pointer, e);
                            PointerOutcome::Invalid(e)
                        }
                    }
                }
            }
        };

        if !outcome.is_resolved() {
            trace!("pointer 0x{:x} unresolved: {}", pointer, outcome.label());
        }

        PointerResult {
            target: pointer,
            outcome,
        }
    }

    /// 判別値を先読みしてスキーマを選ぶ
    fn decode_dispatch(&self, table: &VariantTable, address: u64, path: &mut DecodePath) -> Result<DecodedRecord> {
        let layout = table.layout();
        if !self.memory.contains(address, layout.end()) {
            return Err(DecodeError::TruncatedData {
                schema: table.name().to_string(),
                address,
                needed: layout.end(),
            });
        }

        // 選んだスキーマの先頭フィールドとして同じバイトを読み直す
        let discriminant = self
            .memory
            .read_uint(address + layout.offset as u64, layout.width.bytes())?;

        match table.lookup(discriminant) {
            Some(name) => {
                debug!("{} at 0x{:x}: discriminant {:#x} -> {}", table.name(), address, discriminant, name);
                let schema = self.registry.record(name)?;
                self.decode_fixed(schema, address, RecordKind::Variant { discriminant }, path)
            }
            None => {
                debug!("{} at 0x{:x}: unknown discriminant {:#x}", table.name(), address, discriminant);
                self.decode_fixed(
                    table.unknown_schema(),
                    address,
                    RecordKind::UnknownVariant { discriminant },
                    path,
                )
            }
        }
    }

    /// 固定レイアウトのレコードをデコードする
    ///
    /// 範囲と定数をすべて確認してからフィールドを組み立てるので、失敗時に
    /// 途中までのフィールドやポインタ先のデコードは残りません。
    fn decode_fixed(
        &self,
        schema: &RecordSchema,
        address: u64,
        kind: RecordKind,
        path: &mut DecodePath,
    ) -> Result<DecodedRecord> {
        trace!("decoding {} at 0x{:x}", schema.name(), address);

        if !self.memory.contains(address, schema.size()) {
            return Err(DecodeError::TruncatedData {
                schema: schema.name().to_string(),
                address,
                needed: schema.size(),
            });
        }

        let bytes = self.memory.read(address, schema.size())?;
        check_constants(schema, address, &bytes)?;
        Ok(self.build(schema, address, &bytes, kind, path))
    }

    /// `bytes` はスキーマ全体を覆っていること
    fn build(
        &self,
        schema: &RecordSchema,
        address: u64,
        bytes: &[u8],
        kind: RecordKind,
        path: &mut DecodePath,
    ) -> DecodedRecord {
        let mut fields = Vec::new();
        let mut offset = 0usize;

        for entry in schema.entries() {
            let field = match entry {
                LayoutEntry::Padding(len) => {
                    offset += len;
                    continue;
                }
                LayoutEntry::Field(field) => field,
            };

            let size = field.kind.size();
            let raw = &bytes[offset..offset + size];
            let at = address + offset as u64;

            let value = match &field.kind {
                FieldKind::U32 | FieldKind::ConstU32(_) => DecodedValue::U32(le_uint(raw) as u32),
                FieldKind::U64 => DecodedValue::U64(le_uint(raw)),
                FieldKind::I32 => DecodedValue::I32(le_uint(raw) as u32 as i32),
                FieldKind::Bytes(_) => DecodedValue::Bytes(raw.to_vec()),
                FieldKind::Nested(inner) => {
                    DecodedValue::Record(self.build(inner, at, raw, RecordKind::Fixed, path))
                }
                FieldKind::Pointer(target) => {
                    let pointer = le_uint(&raw[..POINTER_SIZE]);
                    DecodedValue::Pointer(self.resolve_field(schema, bytes, target, pointer, path))
                }
            };

            fields.push(DecodedField {
                name: field.name.clone(),
                value,
            });
            offset += size;
        }

        DecodedRecord {
            schema: schema.name().to_string(),
            address,
            kind,
            fields,
        }
    }

    fn resolve_field(
        &self,
        schema: &RecordSchema,
        bytes: &[u8],
        target: &PointerTarget,
        pointer: u64,
        path: &mut DecodePath,
    ) -> PointerResult {
        match target {
            PointerTarget::Record(name) => self.resolve_record(name, pointer, path),
            PointerTarget::Variants(name) => self.resolve_variants(name, pointer, path),
            PointerTarget::ControlList { size_field } => match size_of_control_list(schema, bytes, size_field) {
                Some(size) => self.resolve_control_list(pointer, size, path),
                None => {
                    let error = DecodeError::MissingSizeField {
                        schema: schema.name().to_string(),
                        field: size_field.clone(),
                    };
                    self.follow(pointer, Err(error.clone()), path, |_| Err(error))
                }
            },
        }
    }
}

/// スキーマ（ネスト含む）のすべての `ConstU32` を確認する
fn check_constants(schema: &RecordSchema, address: u64, bytes: &[u8]) -> Result<()> {
    for (offset, field) in schema.fields() {
        match &field.kind {
            FieldKind::ConstU32(expected) => {
                let found = le_uint(&bytes[offset..offset + 4]) as u32;
                if found != *expected {
                    return Err(DecodeError::SchemaMismatch {
                        schema: schema.name().to_string(),
                        address: address + offset as u64,
                        field: field.name.clone(),
                        expected: *expected,
                        found,
                    });
                }
            }
            FieldKind::Nested(inner) => {
                check_constants(inner, address + offset as u64, &bytes[offset..offset + inner.size()])?;
            }
            _ => {}
        }
    }
    Ok(())
}

/// 同じレコード内のu32サイズフィールドを読む
fn size_of_control_list(schema: &RecordSchema, bytes: &[u8], size_field: &str) -> Option<u32> {
    schema
        .fields()
        .find(|(_, f)| f.name == size_field && f.kind == FieldKind::U32)
        .map(|(offset, _)| le_uint(&bytes[offset..offset + 4]) as u32)
}

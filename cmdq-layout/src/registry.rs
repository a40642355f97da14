//! スキーマレジストリ
//!
//! レコードとvariantテーブルを名前で登録し、ポインタの参照先を解決します。
//! 起動時に一度だけ組み立て、その後は読み取り専用で共有します。

use crate::schema::{FieldKind, PointerTarget, RecordSchema};
use crate::variant::VariantTable;
use crate::{DecodeError, Result, SchemaError};
use std::collections::HashMap;
use std::sync::Arc;

/// スキーマレジストリ
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    records: HashMap<String, Arc<RecordSchema>>,
    tables: HashMap<String, VariantTable>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// レコードを登録する
    ///
    /// 他のスキーマから `Nested` で埋め込めるよう、登録したものを `Arc` で返します。
    pub fn insert_record(
        &mut self,
        schema: RecordSchema,
    ) -> std::result::Result<Arc<RecordSchema>, SchemaError> {
        if self.contains(schema.name()) {
            return Err(SchemaError::Duplicate(schema.name().to_string()));
        }
        let schema = Arc::new(schema);
        self.records
            .insert(schema.name().to_string(), Arc::clone(&schema));
        Ok(schema)
    }

    /// variantテーブルを登録する
    pub fn insert_table(&mut self, table: VariantTable) -> std::result::Result<(), SchemaError> {
        if self.contains(table.name()) {
            return Err(SchemaError::Duplicate(table.name().to_string()));
        }
        self.tables.insert(table.name().to_string(), table);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name) || self.tables.contains_key(name)
    }

    pub fn record(&self, name: &str) -> Result<&Arc<RecordSchema>> {
        self.records
            .get(name)
            .ok_or_else(|| DecodeError::UnknownSchema(name.to_string()))
    }

    pub fn table(&self, name: &str) -> Result<&VariantTable> {
        self.tables
            .get(name)
            .ok_or_else(|| DecodeError::UnknownVariantTable(name.to_string()))
    }

    pub fn is_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// 登録済みの名前（レコードとテーブル）をソートして返す
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .records
            .keys()
            .chain(self.tables.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names
    }

    /// テーブルで振り分けるフレームの最小長
    ///
    /// 登録済みのvariantと未知用スキーマの中で最も短いサイズ。ただし判別値は必ず含みます。
    pub fn min_frame(&self, table: &VariantTable) -> usize {
        let shortest = table
            .variants()
            .filter_map(|(_, name)| self.records.get(name).map(|s| s.size()))
            .chain(std::iter::once(table.unknown_schema().size()))
            .min()
            .unwrap_or(0);
        shortest.max(table.layout().end())
    }

    /// すべての参照が解決でき、variantの先頭定数が判別値と一致することを確認する
    pub fn validate(&self) -> std::result::Result<(), SchemaError> {
        let mut names: Vec<&String> = self.records.keys().collect();
        names.sort_unstable();
        for name in names {
            self.validate_record(&self.records[name])?;
        }

        let mut tables: Vec<&VariantTable> = self.tables.values().collect();
        tables.sort_unstable_by(|a, b| a.name().cmp(b.name()));
        for table in tables {
            for (discriminant, target) in table.variants() {
                let schema =
                    self.records
                        .get(target)
                        .ok_or_else(|| SchemaError::DanglingVariant {
                            table: table.name().to_string(),
                            discriminant,
                            target: target.to_string(),
                        })?;
                let leading = schema.leading_const();
                if leading.is_some_and(|value| u64::from(value) != discriminant) {
                    return Err(SchemaError::VariantTagMismatch {
                        table: table.name().to_string(),
                        discriminant,
                        schema: target.to_string(),
                        leading,
                    });
                }
            }
            self.validate_record(table.unknown_schema())?;
        }
        Ok(())
    }

    fn validate_record(&self, schema: &RecordSchema) -> std::result::Result<(), SchemaError> {
        for (_, field) in schema.fields() {
            let dangling = |target: &str| SchemaError::DanglingTarget {
                schema: schema.name().to_string(),
                field: field.name.clone(),
                target: target.to_string(),
            };
            match &field.kind {
                FieldKind::Pointer(PointerTarget::Record(target)) => {
                    if !self.records.contains_key(target) {
                        return Err(dangling(target));
                    }
                }
                FieldKind::Pointer(PointerTarget::Variants(target)) => {
                    if !self.tables.contains_key(target) {
                        return Err(dangling(target));
                    }
                }
                FieldKind::Pointer(PointerTarget::ControlList { size_field }) => {
                    let is_u32 = schema
                        .field(size_field)
                        .is_some_and(|f| f.kind == FieldKind::U32);
                    if !is_u32 {
                        return Err(SchemaError::BadSizeField {
                            schema: schema.name().to_string(),
                            field: field.name.clone(),
                            size_field: size_field.clone(),
                        });
                    }
                }
                FieldKind::Nested(inner) => self.validate_record(inner)?,
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::{DiscriminantLayout, UnknownPolicy};

    fn node() -> RecordSchema {
        RecordSchema::builder("Node")
            .const_u32("magic", 1)
            .record_ptr("next", "Node")
            .build()
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut registry = SchemaRegistry::new();
        registry.insert_record(node()).unwrap();
        assert_eq!(
            registry.insert_record(node()).unwrap_err(),
            SchemaError::Duplicate("Node".to_string())
        );
        assert!(registry
            .insert_table(VariantTable::new("Node", DiscriminantLayout::LEADING_U32))
            .is_err());
    }

    #[test]
    fn test_lookup_errors() {
        let registry = SchemaRegistry::new();
        assert_eq!(
            registry.record("Missing").unwrap_err(),
            DecodeError::UnknownSchema("Missing".to_string())
        );
        assert_eq!(
            registry.table("Missing").unwrap_err(),
            DecodeError::UnknownVariantTable("Missing".to_string())
        );
    }

    #[test]
    fn test_validate_self_reference() {
        let mut registry = SchemaRegistry::new();
        registry.insert_record(node()).unwrap();
        assert!(registry.validate().is_ok());
    }

    #[test]
    fn test_validate_dangling_pointer() {
        let mut registry = SchemaRegistry::new();
        registry
            .insert_record(RecordSchema::builder("A").record_ptr("b", "B").build())
            .unwrap();
        assert_eq!(
            registry.validate().unwrap_err(),
            SchemaError::DanglingTarget {
                schema: "A".to_string(),
                field: "b".to_string(),
                target: "B".to_string(),
            }
        );
    }

    #[test]
    fn test_validate_control_list_size_field() {
        let mut registry = SchemaRegistry::new();
        registry
            .insert_record(
                RecordSchema::builder("Cmd")
                    .control_list("cl_ptr", "cl_size")
                    .u64("cl_size")
                    .build(),
            )
            .unwrap();
        assert!(matches!(
            registry.validate(),
            Err(SchemaError::BadSizeField { .. })
        ));
    }

    #[test]
    fn test_validate_variant_tag() {
        let mut registry = SchemaRegistry::new();
        registry.insert_record(node()).unwrap();
        registry
            .insert_table(VariantTable::new("Frames", DiscriminantLayout::LEADING_U32).variant(2, "Node"))
            .unwrap();
        assert_eq!(
            registry.validate().unwrap_err(),
            SchemaError::VariantTagMismatch {
                table: "Frames".to_string(),
                discriminant: 2,
                schema: "Node".to_string(),
                leading: Some(1),
            }
        );
    }

    #[test]
    fn test_min_frame() {
        let mut registry = SchemaRegistry::new();
        registry.insert_record(node()).unwrap();
        registry
            .insert_record(
                RecordSchema::builder("Big")
                    .const_u32("magic", 2)
                    .bytes("rest", 0x40)
                    .build(),
            )
            .unwrap();
        let table = VariantTable::new("Frames", DiscriminantLayout::LEADING_U32)
            .variant(1, "Node")
            .variant(2, "Big");
        assert_eq!(registry.min_frame(&table), 0xc);

        let tiny = VariantTable::new("Tiny", DiscriminantLayout::LEADING_U32)
            .unknown("TinyUnknown", UnknownPolicy::Opaque { size: 2 });
        assert_eq!(registry.min_frame(&tiny), 4);
    }

    #[test]
    fn test_names_sorted() {
        let mut registry = SchemaRegistry::new();
        registry.insert_record(node()).unwrap();
        registry
            .insert_table(VariantTable::new("Frames", DiscriminantLayout::LEADING_U32))
            .unwrap();
        assert_eq!(registry.names(), vec!["Frames", "Node"]);
        assert!(registry.is_table("Frames"));
        assert!(!registry.is_table("Node"));
    }
}

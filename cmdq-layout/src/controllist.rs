//! Control listデコーダの差し込み口
//!
//! Control listは別仕様のフォーマットで、ここでは `(ptr, size)` を受け取って
//! サブツリーを返す外部デコーダとして扱います。

use crate::decode::{DecodePath, Decoder};
use crate::value::{DecodedField, DecodedRecord, DecodedValue, RecordKind};
use crate::Result;

/// Control listデコーダ
///
/// 呼び出し前にデコーダがnull・範囲・循環・深さのチェックを済ませています。
/// 実装がさらにポインタを辿る場合は `Decoder::resolve_*` に `path` を渡して、
/// 同じ循環ガードの下で辿ってください。
pub trait ControlListDecoder: Send + Sync {
    fn decode(
        &self,
        decoder: &Decoder<'_>,
        path: &mut DecodePath,
        address: u64,
        size: u32,
    ) -> Result<DecodedRecord>;
}

/// 中身を解釈せずにバイト列として保持するデコーダ
///
/// 保持するのは先頭 `DecodeConfig::max_control_list_bytes` バイトまでです。
#[derive(Debug, Clone, Copy, Default)]
pub struct OpaqueControlList;

impl ControlListDecoder for OpaqueControlList {
    fn decode(
        &self,
        decoder: &Decoder<'_>,
        _path: &mut DecodePath,
        address: u64,
        size: u32,
    ) -> Result<DecodedRecord> {
        let captured = (size as usize).min(decoder.config().max_control_list_bytes);
        let data = decoder.memory().read(address, captured)?;

        Ok(DecodedRecord {
            schema: "ControlList".to_string(),
            address,
            kind: RecordKind::External,
            fields: vec![
                DecodedField {
                    name: "size".to_string(),
                    value: DecodedValue::U32(size),
                },
                DecodedField {
                    name: "data".to_string(),
                    value: DecodedValue::Bytes(data),
                },
            ],
        })
    }
}

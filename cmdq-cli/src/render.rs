//! デコード結果のテキスト表示

use cmdq_core::{DecodedRecord, DecodedValue, PointerOutcome, RecordKind};
use std::fmt::Write as _;

/// 1行に表示するバイト数
const BYTES_PER_LINE: usize = 16;

/// レコードをインデント付きのツリーとして整形する
pub fn render(record: &DecodedRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", header(record));
    render_fields(record, 1, &mut out);
    out
}

fn header(record: &DecodedRecord) -> String {
    match record.kind {
        RecordKind::Variant { discriminant } => {
            format!("{} @ {:#x} (variant {:#x})", record.schema, record.address, discriminant)
        }
        RecordKind::UnknownVariant { discriminant } => format!(
            "{} @ {:#x} (unknown discriminant {:#x})",
            record.schema, record.address, discriminant
        ),
        RecordKind::Fixed | RecordKind::External => {
            format!("{} @ {:#x}", record.schema, record.address)
        }
    }
}

fn render_fields(record: &DecodedRecord, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    for field in &record.fields {
        match &field.value {
            DecodedValue::Bytes(bytes) if bytes.len() > BYTES_PER_LINE => {
                let _ = writeln!(out, "{}{}: {} bytes", indent, field.name, bytes.len());
                for (i, chunk) in bytes.chunks(BYTES_PER_LINE).enumerate() {
                    let _ = writeln!(
                        out,
                        "{}  {:04x}  {}",
                        indent,
                        i * BYTES_PER_LINE,
                        DecodedValue::Bytes(chunk.to_vec())
                    );
                }
            }
            DecodedValue::Record(inner) => {
                let _ = writeln!(out, "{}{}: {}", indent, field.name, header(inner));
                render_fields(inner, depth + 1, out);
            }
            DecodedValue::Pointer(pointer) => {
                let _ = writeln!(out, "{}{}: {}", indent, field.name, pointer);
                if let PointerOutcome::Resolved(inner) = &pointer.outcome {
                    render_fields(inner, depth + 1, out);
                }
            }
            value => {
                let _ = writeln!(out, "{}{}: {}", indent, field.name, value);
            }
        }
    }
}

//! AGXコマンドキューのスキーマカタログ
//!
//! ファームウェアのバージョンが変わるとレイアウトも変わるため、
//! ここにある定義は観測したダンプから得たものです。

use crate::registry::SchemaRegistry;
use crate::schema::RecordSchema;
use crate::variant::{DiscriminantLayout, UnknownPolicy, VariantTable};
use crate::SchemaError;
use tracing::debug;

/// ワークコマンドを振り分けるvariantテーブルの名前
pub const CMD_BUF_WORK: &str = "CmdBufWork";
/// コマンドキュー情報
pub const COMMAND_QUEUE_INFO: &str = "CommandQueueInfo";
/// キューへの投入通知
pub const NOTIFY_CMD_QUEUE_WORK: &str = "NotifyCmdQueueWork";

/// `NotifyCmdQueueWork::queue_type` の名前
pub fn queue_type_name(queue_type: u32) -> Option<&'static str> {
    match queue_type {
        0 => Some("SubmitTA"),
        1 => Some("Submit3D"),
        2 => Some("SubmitCompute"),
        _ => None,
    }
}

/// カタログを組み立てる
///
/// 各レコードは宣言したサイズと一致することを確認してから登録し、
/// 最後に参照の整合性を検証します。
pub fn build_catalog() -> Result<SchemaRegistry, SchemaError> {
    let mut registry = SchemaRegistry::new();

    registry.insert_record(sub_c()?)?;
    registry.insert_record(sub_20()?)?;
    registry.insert_record(work_command_0()?)?;
    registry.insert_record(work_command_1()?)?;
    registry.insert_record(work_command_3()?)?;
    registry.insert_record(work_command_4()?)?;
    registry.insert_record(work_command_6()?)?;
    registry.insert_record(
        RecordSchema::builder("CompletionBuffer")
            .u32("value")
            .build_sized(4)?,
    )?;
    registry.insert_table(
        VariantTable::new(CMD_BUF_WORK, DiscriminantLayout::LEADING_U32)
            .variant(0, "WorkCommand_0")
            .variant(1, "WorkCommand_1")
            .variant(3, "WorkCommand_3")
            .variant(4, "WorkCommand_4")
            .variant(6, "WorkCommand_6")
            .unknown("UnknownWorkCommand", UnknownPolicy::Words { count: 8 }),
    )?;

    registry.insert_record(
        RecordSchema::builder("ContextInfo")
            .u64("unkptr_0")
            .u64("unkptr_8")
            .u64("unkptr_10")
            .build_sized(0x18)?,
    )?;
    registry.insert_record(
        RecordSchema::builder("ContextInfo2")
            .bytes("data", 0x40)
            .build_sized(0x40)?,
    )?;
    registry.insert_record(command_queue_pointers()?)?;
    registry.insert_record(command_queue_info()?)?;
    registry.insert_record(
        RecordSchema::builder(NOTIFY_CMD_QUEUE_WORK)
            .u32("queue_type")
            .record_ptr("cmdqueue_addr", COMMAND_QUEUE_INFO)
            .u32("head")
            .u32("event_number")
            .u32("new_queue")
            .bytes("data", 0x18)
            .build_sized(0x2c)?,
    )?;

    registry.validate()?;
    debug!("schema catalog built with {} entries", registry.names().len());
    Ok(registry)
}

fn sub_c() -> Result<RecordSchema, SchemaError> {
    RecordSchema::builder("WorkCommandSubC")
        .u64("unkptr_0")
        .u32("unk_8")
        .u32("unk_c")
        .u64("unk_10")
        .u64("unk_18")
        .build_sized(0x20)
}

fn sub_20() -> Result<RecordSchema, SchemaError> {
    RecordSchema::builder("WorkCommandSub20")
        .u64("unk_0")
        .u32("unk_8")
        .u32("unk_c")
        .u64("unk_10")
        .u64("unk_18")
        .u64("unkptr_20")
        .u32("unk_28")
        .u32("unk_2c")
        .u32("unk_30")
        .u32("unk_34")
        .u32("unk_38")
        .u64("unkptr_3c")
        // u32が2つ並んだリング制御領域を指す
        .u64("ring_control_addr")
        .u32("unk_4c")
        .u64("unk_50")
        .u32("unk_58")
        .u32("unk_5c")
        .u64("unk_60")
        .u64("unkptr_68")
        .u64("unk_70")
        .u64("unk_78")
        .u32("unk_80")
        .u32("unk_84")
        .u32("unk_88")
        .u32("unk_8c")
        .bytes("unk_90", 0x30)
        .u32("unk_c0")
        .bytes("unk_c4", 0x14)
        .u64("unkptr_d8")
        .u32("unk_e0")
        .u64("unkptr_e4")
        .u32("unk_ec")
        .u64("unk_f0")
        .u64("unk_f8")
        .build_sized(0x100)
}

/// TA用
fn work_command_0() -> Result<RecordSchema, SchemaError> {
    RecordSchema::builder("WorkCommand_0")
        .const_u32("magic", 0)
        .u32("context_id")
        .u32("unk_8")
        .record_ptr("unkptr_c", "WorkCommandSubC")
        .u64("unk_14")
        .record_ptr("unkptr_1c", "WorkCommandSub20")
        .u64("unkptr_24")
        .u64("unkptr_2c")
        .u32("unk_34")
        // control listが指し返すデータ領域
        .pad_to(0x45c)
        .u64("unkptr_45c")
        .u64("tvb_size")
        .control_list("controllist_ptr", "controllist_size")
        .u32("controllist_size")
        .u32("unk_478")
        .u32("complete_tag")
        .build_sized(0x480)
}

/// 3D用
fn work_command_1() -> Result<RecordSchema, SchemaError> {
    RecordSchema::builder("WorkCommand_1")
        .const_u32("magic", 1)
        .u32("context_id")
        .u32("unk_8")
        .control_list("controllist_ptr", "controllist_size")
        .u32("controllist_size")
        .record_ptr("unkptr_18", "WorkCommandSubC")
        .record_ptr("unkptr_20", "WorkCommandSub20")
        .u64("unkptr_28")
        .u64("unkptr_30")
        .u64("tvb_addr")
        .u64("unk_40")
        .u32("unk_48")
        .u32("unk_4c")
        .u64("unk_50")
        .u64("unk_58")
        // 同じ投入の繰り返しでは変わらない
        .u32("uuid1")
        .u32("uuid2")
        .u64("unk_68")
        .u64("unk_70")
        .build_sized(0x78)
}

/// Compute用
fn work_command_3() -> Result<RecordSchema, SchemaError> {
    RecordSchema::builder("WorkCommand_3")
        .const_u32("magic", 3)
        .u32("unk_4")
        .u32("context_id")
        .record_ptr("unkptr_c", "WorkCommandSubC")
        .pad_to(0x1e8)
        .control_list("controllist_ptr", "controllist_size")
        .u32("controllist_size")
        .build_sized(0x1f4)
}

fn work_command_4() -> Result<RecordSchema, SchemaError> {
    RecordSchema::builder("WorkCommand_4")
        .const_u32("magic", 4)
        .record_ptr("completion_buf_addr", "CompletionBuffer")
        .u32("complete_tag1")
        .u32("flag")
        .u32("complete_tag2")
        .u32("uuid")
        .build_sized(0x1c)
}

fn work_command_6() -> Result<RecordSchema, SchemaError> {
    RecordSchema::builder("WorkCommand_6")
        .const_u32("magic", 6)
        .u32("context_id")
        .u32("unk_8")
        .u32("unk_c")
        .u32("unk_10")
        .record_ptr("unkptr_14", "WorkCommandSub20")
        .u32("complete_tag")
        .build_sized(0x20)
}

/// 各カウンタは16バイト境界に置かれる
fn command_queue_pointers() -> Result<RecordSchema, SchemaError> {
    ["gpu_doneptr", "unk_10", "unk_20", "gpu_rptr", "cpu_wptr", "rb_size"]
        .into_iter()
        .fold(RecordSchema::builder("CommandQueuePointers"), |builder, name| {
            builder.u32(name).padding(12)
        })
        .build_sized(0x60)
}

fn command_queue_info() -> Result<RecordSchema, SchemaError> {
    RecordSchema::builder(COMMAND_QUEUE_INFO)
        .record_ptr("pointers_addr", "CommandQueuePointers")
        // 0x4ff個のポインタからなるリングバッファ
        .u64("RingBuffer_addr")
        .record_ptr("ContextInfo_addr", "ContextInfo")
        .u64("gpu_buf")
        .u32("gpu_rptr1")
        .u32("gpu_rptr2")
        .u32("gpu_rptr3")
        .u32("unk_2c")
        .u32("unk_30")
        .u32("unk_34")
        .u64("unk_38")
        .u32("unk_40")
        .u32("unk_44")
        .u32("unk_48")
        .i32("unk_4c")
        .u32("unk_50")
        .u32("unk_54")
        .u64("unk_58")
        .u32("unk_60")
        .padding(0x20)
        .u32("unk_84")
        .padding(0x18)
        .record_ptr("contextinfo2_addr", "ContextInfo2")
        .build_sized(0xa8)
}

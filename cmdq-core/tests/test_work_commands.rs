//! 観測したダンプによるワークコマンドのデコードテスト

mod common;

use cmdq_core::{DecodeError, PointerOutcome, RecordKind};
use common::*;

fn outcome<'r>(record: &'r cmdq_core::DecodedRecord, field: &str) -> &'r PointerOutcome {
    &record
        .pointer(field)
        .unwrap_or_else(|| panic!("{} is not a pointer field", field))
        .outcome
}

#[test]
fn test_work_command_0_needs_whole_frame() {
    // ダンプは0x400バイトで、0x480バイトのフレームには足りない
    let session = ImageBuilder::from_hexdump(WORK_COMMAND_0).session();
    assert_eq!(session.image().len(), 0x400);

    let err = session.decode_work(BASE).unwrap_err();
    assert_eq!(
        err.downcast_ref::<DecodeError>(),
        Some(&DecodeError::TruncatedData {
            schema: "WorkCommand_0".to_string(),
            address: BASE,
            needed: 0x480,
        })
    );
}

#[test]
fn test_work_command_0() {
    let session = ImageBuilder::from_hexdump(WORK_COMMAND_0).pad_to(0x480).session();

    let record = session.decode_work(BASE).unwrap();

    assert_eq!(record.schema, "WorkCommand_0");
    assert_eq!(record.kind, RecordKind::Variant { discriminant: 0 });
    assert_eq!(record.u32("magic"), Some(0));
    assert_eq!(record.u32("context_id"), Some(4));
    assert_eq!(record.u64("unkptr_c"), Some(0xffff_ffa0_0c3d_80c0));
    assert_eq!(record.u64("unk_14"), Some(2));
    assert_eq!(record.u64("unkptr_1c"), Some(0xffff_ffa0_0c3e_0000));
    assert_eq!(record.u64("unkptr_24"), Some(0xffff_ffa0_0c3e_0100));
    assert_eq!(record.u64("unkptr_2c"), Some(0xffff_ffa0_0c3e_09c0));
    assert_eq!(record.u32("unk_34"), Some(0));

    // パディング領域はフィールドにならない
    assert!(record.get("unk_38").is_none());

    // 参照先はキャプチャ窓の外
    assert_eq!(outcome(&record, "unkptr_c"), &PointerOutcome::OutOfBounds);
    assert_eq!(outcome(&record, "unkptr_1c"), &PointerOutcome::OutOfBounds);
    // 末尾は0埋めなのでcontrol listはnull
    assert_eq!(outcome(&record, "controllist_ptr"), &PointerOutcome::Null);
}

#[test]
fn test_work_command_1() {
    let session = ImageBuilder::from_hexdump(WORK_COMMAND_1).session();

    let record = session.decode_work(BASE).unwrap();

    assert_eq!(record.schema, "WorkCommand_1");
    assert_eq!(record.u32("context_id"), Some(4));
    assert_eq!(record.u64("controllist_ptr"), Some(0xffff_ffa0_0c2d_5f00));
    assert_eq!(record.u32("controllist_size"), Some(0x2c0));
    assert_eq!(record.u64("unkptr_18"), Some(0xffff_ffa0_0c3d_80c0));
    assert_eq!(record.u64("unkptr_20"), Some(0xffff_ffa0_0c3e_0000));
    assert_eq!(record.u64("unkptr_28"), Some(0xffff_ffa0_0c3e_0100));
    assert_eq!(record.u64("unkptr_30"), Some(0xffff_ffa0_0c3e_09c0));
    assert_eq!(record.u64("tvb_addr"), Some(0x15_01cb_0000));
    assert_eq!(record.u64("unk_40"), Some(0x88));
    assert_eq!(record.u32("unk_48"), Some(1));
    assert_eq!(record.u32("unk_4c"), Some(0x0010_000c));
    assert_eq!(record.u32("uuid1"), Some(0x3a8d_e3be));
    assert_eq!(record.u32("uuid2"), Some(0x3abd_2fa8));
    assert_eq!(record.u64("unk_68"), Some(0));
    assert_eq!(record.u64("unk_70"), Some(0x76c));

    assert_eq!(outcome(&record, "controllist_ptr"), &PointerOutcome::OutOfBounds);
    let paths: Vec<String> = record
        .unresolved_pointers()
        .into_iter()
        .map(|(path, _)| path)
        .collect();
    assert_eq!(paths, vec!["controllist_ptr", "unkptr_18", "unkptr_20"]);
}

#[test]
fn test_work_command_3() {
    let session = ImageBuilder::from_hexdump(WORK_COMMAND_3).session();

    let record = session.decode_work(BASE).unwrap();

    assert_eq!(record.schema, "WorkCommand_3");
    assert_eq!(record.u32("unk_4"), Some(0));
    assert_eq!(record.u32("context_id"), Some(4));
    assert_eq!(record.u64("unkptr_c"), Some(0xffff_ffa0_0c3d_80c0));
    assert_eq!(record.u64("controllist_ptr"), Some(0xffff_ffa0_0c31_1cc0));
    assert_eq!(record.u32("controllist_size"), Some(0x240));
    assert_eq!(record.fields.len(), 6);
}

#[test]
fn test_work_command_4() {
    let session = ImageBuilder::from_hexdump(WORK_COMMAND_4).session();

    let record = session.decode_work(BASE).unwrap();

    assert_eq!(record.schema, "WorkCommand_4");
    assert_eq!(record.kind, RecordKind::Variant { discriminant: 4 });
    assert_eq!(record.u64("completion_buf_addr"), Some(0xffff_ffa0_0c37_8018));
    assert_eq!(record.u32("complete_tag1"), Some(0xc00));
    assert_eq!(record.u32("flag"), Some(6));
    assert_eq!(record.u32("complete_tag2"), Some(0x900));
    assert_eq!(record.u32("uuid"), Some(0x0800_2c9a));
}

#[test]
fn test_work_command_4_completion_buffer() {
    // completion_buf_addrの参照先をキャプチャ窓に含める
    let session = ImageBuilder::from_hexdump(WORK_COMMAND_4)
        .u32(0x37_8018, 0x800)
        .session();

    let record = session.decode_work(BASE).unwrap();

    let buffer = record.resolved("completion_buf_addr").unwrap();
    assert_eq!(buffer.schema, "CompletionBuffer");
    assert_eq!(buffer.address, 0xffff_ffa0_0c37_8018);
    assert_eq!(buffer.u32("value"), Some(0x800));
}

#[test]
fn test_kind_6_example_is_a_kind_4_frame() {
    // 6番の例として記録されたダンプの先頭は4
    let session = ImageBuilder::from_hexdump(WORK_COMMAND_4).session();

    assert_eq!(session.decode_work(BASE).unwrap().schema, "WorkCommand_4");

    let err = session.decode("WorkCommand_6", BASE).unwrap_err();
    assert_eq!(
        err.downcast_ref::<DecodeError>(),
        Some(&DecodeError::SchemaMismatch {
            schema: "WorkCommand_6".to_string(),
            address: BASE,
            field: "magic".to_string(),
            expected: 6,
            found: 4,
        })
    );
}

#[test]
fn test_mismatch_leaves_other_frames_intact() {
    // 0x40に先頭ワードだけ壊れた4番フレームを置く
    let corrupt = addr(0x40);
    let session = ImageBuilder::from_hexdump(WORK_COMMAND_4)
        .u32(0x40, 0xdead)
        .u64(0x44, 0xffff_ffa0_0c37_8018)
        .u32(0x4c, 0xc01)
        .u32(0x50, 6)
        .pad_to(0x80)
        .session();

    let first = session.decode("WorkCommand_4", BASE).unwrap();

    let err = session.decode("WorkCommand_4", corrupt).unwrap_err();
    assert_eq!(
        err.downcast_ref::<DecodeError>(),
        Some(&DecodeError::SchemaMismatch {
            schema: "WorkCommand_4".to_string(),
            address: corrupt,
            field: "magic".to_string(),
            expected: 4,
            found: 0xdead,
        })
    );

    let again = session.decode("WorkCommand_4", BASE).unwrap();
    assert_eq!(again, first);
    assert_eq!(again.u32("complete_tag1"), Some(0xc00));
}

#[test]
fn test_work_command_6() {
    let sub20 = addr(0x100);
    let session = ImageBuilder::new()
        .u32(0x00, 6)
        .u32(0x04, 4)
        .u32(0x10, 0x30)
        .u64(0x14, sub20)
        .u32(0x1c, 0x100)
        .u64(0x100 + 0x44, 0xffff_ffa0_0000_1000)
        .pad_to(0x200)
        .session();

    let record = session.decode_work(BASE).unwrap();

    assert_eq!(record.schema, "WorkCommand_6");
    assert_eq!(record.u32("context_id"), Some(4));
    assert_eq!(record.u32("unk_10"), Some(0x30));
    assert_eq!(record.u32("complete_tag"), Some(0x100));
    let sub = record.resolved("unkptr_14").unwrap();
    assert_eq!(sub.schema, "WorkCommandSub20");
    assert_eq!(sub.u64("ring_control_addr"), Some(0xffff_ffa0_0000_1000));
    assert_eq!(sub.bytes("unk_90").map(<[u8]>::len), Some(0x30));
}

#[test]
fn test_unknown_work_command() {
    let session = ImageBuilder::new()
        .u32(0x00, 5)
        .u32(0x04, 0x11)
        .u32(0x1c, 0x77)
        .session();

    let record = session.decode_work(BASE).unwrap();

    assert_eq!(record.schema, "UnknownWorkCommand");
    assert_eq!(record.kind, RecordKind::UnknownVariant { discriminant: 5 });
    assert_eq!(record.u32("discriminant"), Some(5));
    assert_eq!(record.u32("unk_4"), Some(0x11));
    assert_eq!(record.u32("unk_1c"), Some(0x77));
}

#[test]
fn test_work_command_1_with_resident_targets() {
    let sub_c = addr(0x100);
    let sub_20 = addr(0x200);
    let control_list = addr(0x300);
    let session = ImageBuilder::from_hexdump(WORK_COMMAND_1)
        .u64(0x0c, control_list)
        .u32(0x14, 0x10)
        .u64(0x18, sub_c)
        .u64(0x20, sub_20)
        .u64(0x100, sub_20)
        .u32(0x108, 0xabcd)
        .u32(0x300, 0x1234_5678)
        .pad_to(0x310)
        .session();

    let record = session.decode_work(BASE).unwrap();

    let sub_c_record = record.resolved("unkptr_18").unwrap();
    assert_eq!(sub_c_record.schema, "WorkCommandSubC");
    assert_eq!(sub_c_record.u64("unkptr_0"), Some(sub_20));
    assert_eq!(sub_c_record.u32("unk_8"), Some(0xabcd));

    assert_eq!(record.resolved("unkptr_20").unwrap().schema, "WorkCommandSub20");

    let list = record.resolved("controllist_ptr").unwrap();
    assert_eq!(list.kind, RecordKind::External);
    assert_eq!(list.u32("size"), Some(0x10));
    assert_eq!(list.bytes("data").map(|b| b[..4].to_vec()), Some(vec![0x78, 0x56, 0x34, 0x12]));

    assert!(record.unresolved_pointers().is_empty());
}

#[test]
fn test_self_referencing_work_command() {
    // unkptr_18がフレーム自身を指す
    let session = ImageBuilder::from_hexdump(WORK_COMMAND_1)
        .u64(0x0c, 0)
        .u64(0x18, BASE)
        .u64(0x20, 0)
        .session();

    let record = session.decode_work(BASE).unwrap();

    assert_eq!(outcome(&record, "unkptr_18"), &PointerOutcome::CycleDetected);
    assert_eq!(outcome(&record, "controllist_ptr"), &PointerOutcome::Null);
}

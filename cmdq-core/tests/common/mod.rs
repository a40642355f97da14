//! 統合テスト用のフィクスチャ

#![allow(dead_code)]

use cmdq_core::{MemoryImage, Session};

/// キャプチャ窓の先頭アドレス
pub const BASE: u64 = 0xffff_ffa0_0c00_0000;

/// TA用ワークコマンド（先頭0x400バイトのみ）
pub const WORK_COMMAND_0: &str = "\
00000000  00000000 00000004 00000000 0c3d80c0 ffffffa0 00000002 00000000 0c3e0000
00000020  ffffffa0 0c3e0100 ffffffa0 0c3e09c0 ffffffa0 00000000 00000200 00000000
00000040  1e3ce508 1e3ce508 01cb0000 00000015 00000000 00000000 00970000 00000015
00000060  01cb4000 80000015 006b0003 003a0012 00000001 00000000 00000000 00000000
00000080  0000a000 00000000 00000088 00000000 01cb4000 00000015 00000000 00000000
000000a0  0000ff00 00000000 007297a0 00000015 00728120 00000015 00000001 00000000
000000c0  00728000 00040015 009f8000 00000015 00000000 00000000 00000000 00000000
000000e0  0000a441 00000000 00000000 00000000 00000000 00000000 00000000 00000000
00000100  00000000 00000000 00000000 00000000 00000000 00000000 00000000 00000011
00000120  00000000 00000000 0000001c 00000000 00008c60 00000000 00000000 00000000
00000140  00000000 00000000 00000000 00000000 0000001c 00000000 00000000 00000000
00000160  00000000 00000000 00000000 00000000 00000000 00000000 00000000 00000000
00000180  *
000003a0  00000000 00000000 00000000 00000000 00000000 00000000 00000000 000000f0
000003c0  00000088 00000202 04af063f 00025031 00404030 00303024 000000c0 00000180
000003e0  00000100 00008000 00000000 00000000 00000000 00000000 00000000 00000000
";

/// 3D用ワークコマンド
pub const WORK_COMMAND_1: &str = "\
00000000  00000001 00000004 00000000 0c2d5f00 ffffffa0 000002c0 0c3d80c0 ffffffa0
00000020  0c3e0000 ffffffa0 0c3e0100 ffffffa0 0c3e09c0 ffffffa0 01cb0000 00000015
00000040  00000088 00000000 00000001 0010000c 00000000 00000000 00000000 00000000
00000060  3a8de3be 3abd2fa8 00000000 00000000 0000076c 00000000 0000a000 00000000
00000080  ffff8002 00000000 00028044 00000000 00000088 00000000 005d0000 00000015
000000a0  00758000 00000015 0000c000 00000000 00000640 000004b0 0257863f 00000000
";

/// Compute用ワークコマンド
pub const WORK_COMMAND_3: &str = "\
00000000  00000003 00000000 00000004 0c3d80c0 ffffffa0 00000000 00000000 00000000
00000020  00000000 00000000 00000000 00000000 00000000 00000000 00000000 00000000
00000040  *
00000060  00000000 00000000 00088000 00000015 00078000 00000015 000a6300 00000015
00000080  000a6308 00000015 000a6310 00000015 000a6318 00000015 00000000 00000011
000000a0  00008c60 00000000 00000041 00000000 000e8000 00000015 00000040 00000000
000000c0  00000001 00000000 0000001c 00000000 00000000 00000000 00000000 00000000
000000e0  00000000 00000000 00000000 00000000 00000000 00000000 00000000 00000000
00000100  *
000001e0  00000000 00000000 0c311cc0 ffffffa0 00000240 00000000 00000000 00000000
00000200  00000000 00000000 00000000 00000000 00000000 00000000 00088000 00000015
";

/// Submit3Dキューで1番に先立って送られるワークコマンド
pub const WORK_COMMAND_4: &str = "\
00000000  00000004 0c378018 ffffffa0 00000c00 00000006 00000900 08002c9a 00000000
00000020  00000000 00000000 00000000 00000000 00000000 00000000 00000000 00000000
";

/// hexdumpを元にイメージを組み立てる
pub struct ImageBuilder {
    data: Vec<u8>,
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn from_hexdump(dump: &str) -> Self {
        let image = MemoryImage::from_hexdump(dump, BASE).expect("Failed to parse hexdump");
        let data = image.read(BASE, image.len()).unwrap().to_vec();
        Self { data }
    }

    /// 長さが `len` になるまで0で埋める
    pub fn pad_to(mut self, len: usize) -> Self {
        if self.data.len() < len {
            self.data.resize(len, 0);
        }
        self
    }

    pub fn u32(mut self, offset: usize, value: u32) -> Self {
        self = self.pad_to(offset + 4);
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        self
    }

    pub fn u64(mut self, offset: usize, value: u64) -> Self {
        self = self.pad_to(offset + 8);
        self.data[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn image(self) -> MemoryImage {
        MemoryImage::new(BASE, self.data).expect("Failed to create image")
    }

    pub fn session(self) -> Session {
        Session::with_image(self.image())
    }
}

/// イメージ内のアドレス
pub fn addr(offset: usize) -> u64 {
    BASE + offset as u64
}

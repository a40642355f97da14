//! テキストhexdumpの読み込み
//!
//! 形式は `<offset> <word> <word> ...` の行の並びで、各ワードは32bitリトルエンディアンです。
//! `*` だけの行（またはオフセットに続く `*`）は、直前の行の内容を次の行のオフセットまで
//! 繰り返すことを表します。

use crate::{ImageError, Result};

/// hexdumpから組み立てるイメージの上限
pub const MAX_IMAGE_BYTES: usize = 0x400_0000;

/// hexdumpをバイト列に変換する
///
/// オフセットはイメージ先頭からの相対値です。空行は無視します。
/// オフセットが [`MAX_IMAGE_BYTES`] を超える行はエラーになります。
pub fn parse(text: &str) -> Result<Vec<u8>> {
    let mut data: Vec<u8> = Vec::new();
    let mut previous: Vec<u8> = Vec::new();
    // 未適用の `*` がある行番号
    let mut repeat: Option<usize> = None;

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "*" {
            if previous.is_empty() {
                return Err(malformed(line_no, "'*' without a preceding line"));
            }
            repeat = Some(line_no);
            continue;
        }

        let mut tokens = line.split_whitespace().peekable();
        let offset = match tokens.next() {
            Some(token) => parse_hex(token)
                .ok_or_else(|| malformed(line_no, &format!("invalid offset '{}'", token)))?,
            None => continue,
        };
        let offset = usize::try_from(offset)
            .ok()
            .filter(|&offset| offset <= MAX_IMAGE_BYTES)
            .ok_or_else(|| {
                malformed(
                    line_no,
                    &format!("offset {:#x} exceeds the {:#x}-byte limit", offset, MAX_IMAGE_BYTES),
                )
            })?;

        if repeat.take().is_some() {
            // 直前の行をoffsetまで繰り返す
            while data.len() < offset {
                let remaining = offset - data.len();
                let chunk = &previous[..previous.len().min(remaining)];
                data.extend_from_slice(chunk);
            }
        }

        if offset != data.len() {
            return Err(malformed(
                line_no,
                &format!("offset {:#x} does not follow {:#x}", offset, data.len()),
            ));
        }

        // `<offset> *` は次のオフセットまで繰り返す
        if tokens.peek() == Some(&"*") {
            if previous.is_empty() {
                return Err(malformed(line_no, "'*' without a preceding line"));
            }
            repeat = Some(line_no);
            continue;
        }

        let mut bytes = Vec::new();
        for token in tokens {
            let word = parse_hex(token)
                .filter(|_| token.len() <= 8)
                .ok_or_else(|| malformed(line_no, &format!("invalid word '{}'", token)))?;
            bytes.extend_from_slice(&(word as u32).to_le_bytes());
        }
        if data.len() + bytes.len() > MAX_IMAGE_BYTES {
            return Err(malformed(line_no, "image exceeds the size limit"));
        }
        data.extend_from_slice(&bytes);
        previous = bytes;
    }

    if let Some(line_no) = repeat {
        return Err(malformed(line_no, "'*' without a following offset"));
    }

    Ok(data)
}

fn parse_hex(token: &str) -> Option<u64> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    u64::from_str_radix(digits, 16).ok()
}

fn malformed(line: usize, message: &str) -> ImageError {
    ImageError::Hexdump {
        line,
        message: message.to_string(),
    }
}

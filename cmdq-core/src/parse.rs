//! パース関連のユーティリティ関数

use anyhow::Result;

/// アドレス文字列をu64にパース
///
/// 16進数（0xプレフィックス付き）または10進数をサポート。
/// 読みやすさのための `_` は無視します。
///
/// # Examples
/// ```
/// use cmdq_core::parse::parse_address;
///
/// assert_eq!(parse_address("0x1234").unwrap(), 0x1234);
/// assert_eq!(parse_address("0xffff_ffa0_0c37_8018").unwrap(), 0xffff_ffa0_0c37_8018);
/// assert_eq!(parse_address("1234").unwrap(), 1234);
/// ```
pub fn parse_address(s: &str) -> Result<u64> {
    let s = s.trim();
    let digits: String = s.chars().filter(|&c| c != '_').collect();

    if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16)
            .map_err(|e| anyhow::anyhow!("Invalid hexadecimal address '{}': {}", s, e))
    } else {
        // 10進数でもダメなら16進数として解釈を試みる
        digits
            .parse::<u64>()
            .or_else(|_| u64::from_str_radix(&digits, 16))
            .map_err(|e| anyhow::anyhow!("Invalid address '{}': {}", s, e))
    }
}

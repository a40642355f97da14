//! エラーメッセージ定数

/// 深さに0を指定した場合のエラーメッセージ
pub const ERR_INVALID_DEPTH: &str = "Depth must be at least 1";

/// 解釈できないコマンドのエラーメッセージ
pub const ERR_UNKNOWN_COMMAND: &str = "Unknown command. Type 'help' for available commands.";

//! 対話シェルのコマンド

use crate::parse::parse_address;

/// 対話シェルのコマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// ワークコマンドをデコード（判別値で振り分け）
    Work(u64),
    /// コマンドキュー情報をデコード
    Queue(u64),
    /// キュー投入通知をデコード
    Notify(u64),
    /// 任意のスキーマまたはvariantテーブルでデコード
    Decode { schema: String, address: u64 },
    /// 登録済みスキーマ一覧
    Schemas,
    /// イメージ情報表示
    Info,
    /// ポインタを辿る最大深さを設定
    Depth(usize),
    /// ヘルプ表示
    Help,
    /// 終了
    Quit,
}

impl Command {
    /// コマンド文字列をパースする
    pub fn parse(input: &str) -> Option<Self> {
        let parts: Vec<&str> = input.split_whitespace().collect();
        if parts.is_empty() {
            return None;
        }

        let address = |i: usize| parts.get(i).and_then(|s| parse_address(s).ok());

        match parts[0] {
            "work" | "w" => address(1).map(Command::Work),
            "queue" => address(1).map(Command::Queue),
            "notify" => address(1).map(Command::Notify),
            "decode" | "d" => {
                let schema = parts.get(1)?.to_string();
                address(2).map(|address| Command::Decode { schema, address })
            }
            "schemas" => Some(Command::Schemas),
            "info" | "i" => Some(Command::Info),
            "depth" => parts.get(1)?.parse().ok().map(Command::Depth),
            "help" | "h" | "?" => Some(Command::Help),
            "quit" | "q" | "exit" => Some(Command::Quit),
            _ => None,
        }
    }
}

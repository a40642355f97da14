//! デコードセッション

use crate::{errors::ERR_INVALID_DEPTH, Result};
use anyhow::Context as _;
use cmdq_image::MemoryImage;
use cmdq_layout::{
    catalog, DecodeConfig, DecodedRecord, Decoder, SchemaRegistry, CMD_BUF_WORK, COMMAND_QUEUE_INFO,
    NOTIFY_CMD_QUEUE_WORK,
};
use std::borrow::Cow;
use std::path::Path;
use tracing::{debug, info};

/// デコードセッション
///
/// メモリイメージ、スキーマレジストリ、デコード設定をまとめて保持します。
/// デコードは `&self` で行うので、1つのセッションを複数スレッドから使えます。
pub struct Session {
    /// キャプチャしたメモリ
    image: MemoryImage,
    /// 既定では組み込みのAGXカタログ
    registry: Cow<'static, SchemaRegistry>,
    config: DecodeConfig,
}

impl Session {
    /// 生のメモリイメージを開く
    pub fn open<P: AsRef<Path>>(path: P, base: u64) -> Result<Self> {
        let path = path.as_ref();
        let image = MemoryImage::from_file(path, base)
            .with_context(|| format!("Failed to load image {}", path.display()))?;
        info!("loaded {} bytes at 0x{:x} from {}", image.len(), base, path.display());
        Ok(Self::with_image(image))
    }

    /// テキストのhexdumpを開く
    pub fn open_hexdump<P: AsRef<Path>>(path: P, base: u64) -> Result<Self> {
        let path = path.as_ref();
        let image = MemoryImage::from_hexdump_file(path, base)
            .with_context(|| format!("Failed to load hexdump {}", path.display()))?;
        info!("loaded {} bytes at 0x{:x} from {}", image.len(), base, path.display());
        Ok(Self::with_image(image))
    }

    /// 読み込み済みのイメージからセッションを作成する
    pub fn with_image(image: MemoryImage) -> Self {
        Self {
            image,
            registry: Cow::Borrowed(catalog()),
            config: DecodeConfig::default(),
        }
    }

    /// カタログの代わりに独自のレジストリを使う
    pub fn with_registry(mut self, registry: SchemaRegistry) -> Self {
        self.registry = Cow::Owned(registry);
        self
    }

    pub fn image(&self) -> &MemoryImage {
        &self.image
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }

    /// ポインタを辿る最大深さを設定する
    pub fn set_max_depth(&mut self, depth: usize) -> Result<()> {
        if depth == 0 {
            anyhow::bail!(ERR_INVALID_DEPTH);
        }
        debug!("max depth set to {}", depth);
        self.config.max_depth = depth;
        Ok(())
    }

    /// 現在の設定でデコーダを作成する
    pub fn decoder(&self) -> Decoder<'_> {
        Decoder::new(&self.image, &self.registry).with_config(self.config.clone())
    }

    /// ワークコマンドを判別値で振り分けてデコードする
    pub fn decode_work(&self, address: u64) -> Result<DecodedRecord> {
        self.decode(CMD_BUF_WORK, address)
    }

    /// コマンドキュー情報をデコードする
    pub fn decode_queue(&self, address: u64) -> Result<DecodedRecord> {
        self.decode(COMMAND_QUEUE_INFO, address)
    }

    /// キュー投入通知をデコードする
    pub fn decode_notify(&self, address: u64) -> Result<DecodedRecord> {
        self.decode(NOTIFY_CMD_QUEUE_WORK, address)
    }

    /// レコード名またはvariantテーブル名でデコードする
    pub fn decode(&self, name: &str, address: u64) -> Result<DecodedRecord> {
        let record = self
            .decoder()
            .decode_any(name, address)
            .with_context(|| format!("Failed to decode {} at 0x{:x}", name, address))?;

        let unresolved = record.unresolved_pointers().len();
        if unresolved > 0 {
            debug!("{} at 0x{:x}: {} unresolved pointer(s)", record.schema, address, unresolved);
        }
        Ok(record)
    }

    /// 登録済みのスキーマ名とvariantテーブル名
    pub fn schema_names(&self) -> Vec<&str> {
        self.registry.names()
    }
}

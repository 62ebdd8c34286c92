use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::datum::{Encoding, PackOptions};
use crate::loader::{ColorMode, Resize};
use crate::store::Backend;

/// 每个事务最多写入的记录数量
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// 将图片对转换为 lmdb/leveldb 数据库
///
/// 清单文件每行格式为 `<图片1> <图片2> <标签>`，图片路径相对于 ROOT_FOLDER
#[derive(Parser, Debug, Clone)]
#[command(name = "pairset", version, verbatim_doc_comment)]
pub struct Opts {
    /// 图片所在的根目录
    pub root_folder: PathBuf,
    /// 图片对清单文件
    pub manifest: PathBuf,
    /// 输出数据库路径，必须不存在
    pub db_path: PathBuf,
    /// 以灰度模式读取图片
    #[arg(long)]
    pub gray: bool,
    /// 随机打乱图片对的顺序
    #[arg(long)]
    pub shuffle: bool,
    /// 打乱顺序使用的随机种子，不指定则每次运行结果不同
    #[arg(long, value_name = "SEED", requires = "shuffle")]
    pub seed: Option<u64>,
    /// 存储结果使用的数据库
    #[arg(long, value_enum, default_value_t = Backend::Lmdb)]
    pub backend: Backend,
    /// 缩放后的图片宽度，0 表示不缩放
    #[arg(long, alias = "resize_width", value_name = "WIDTH", default_value_t = 0, allow_negative_numbers = true)]
    pub resize_width: i32,
    /// 缩放后的图片高度，0 表示不缩放
    #[arg(long, alias = "resize_height", value_name = "HEIGHT", default_value_t = 0, allow_negative_numbers = true)]
    pub resize_height: i32,
    /// 检查所有记录的数据大小是否一致
    #[arg(long, alias = "check_size")]
    pub check_size: bool,
    /// 在记录中保存编码后的图片（保留选项，当前不生效）
    #[arg(long)]
    pub encoded: bool,
    /// 图片编码格式，如 png、jpg（保留选项，当前不生效）
    #[arg(long, alias = "encode_type", value_name = "EXT", default_value = "")]
    pub encode_type: String,
    /// 多少条记录提交一次事务
    #[arg(long, alias = "batch_size", value_name = "SIZE", default_value_t = DEFAULT_BATCH_SIZE as u64, value_parser = clap::value_parser!(u64).range(1..))]
    pub batch_size: u64,
}

/// 转换流程使用的配置，由命令行参数生成
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub color: ColorMode,
    pub resize: Resize,
    pub check_size: bool,
    pub batch_size: NonZeroUsize,
    pub pack: PackOptions,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            color: ColorMode::Color,
            resize: Resize::Native,
            check_size: false,
            batch_size: NonZeroUsize::new(DEFAULT_BATCH_SIZE).unwrap_or(NonZeroUsize::MIN),
            pack: PackOptions::default(),
        }
    }
}

impl From<&Opts> for ConvertOptions {
    fn from(opts: &Opts) -> Self {
        let color = if opts.gray { ColorMode::Gray } else { ColorMode::Color };
        let resize = Resize::new(opts.resize_width.max(0) as u32, opts.resize_height.max(0) as u32);
        Self {
            color,
            resize,
            check_size: opts.check_size,
            // 命令行已限制 batch_size >= 1
            batch_size: NonZeroUsize::new(opts.batch_size as usize).unwrap_or(NonZeroUsize::MIN),
            // 编码存储尚未启用，encoded/encode_type 仅做解析
            pack: PackOptions { encoding: None },
        }
    }
}

impl Opts {
    /// 解析 `--encode-type`，空字符串表示未指定
    pub fn encode_type(&self) -> Option<Encoding> {
        if self.encode_type.is_empty() {
            return None;
        }
        Encoding::from_str(&self.encode_type, true).ok()
    }

    /// 指定了 `--encoded` 或任意非空的 `--encode-type`
    pub fn encoding_requested(&self) -> bool {
        self.encoded || !self.encode_type.is_empty()
    }
}

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use rand::Rng;
use rand::seq::SliceRandom;

/// 清单中的一行：两张图片的路径和标签
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ManifestEntry {
    /// 在清单中的原始位置，打乱顺序后保持不变，用于生成数据库的键
    pub index: usize,
    pub image1: String,
    pub image2: String,
    pub label: i32,
}

/// 解析清单内容
///
/// 与流式读取一致，换行和空格没有区别，每次读取三个以空白分隔的字段。
/// 遇到不完整或标签无法解析的记录时停止，之后的内容全部忽略，不会报错。
pub fn parse_manifest(content: &str) -> Vec<ManifestEntry> {
    let mut tokens = content.split_whitespace();
    let mut entries = vec![];

    loop {
        let (Some(image1), Some(image2), Some(label)) = (tokens.next(), tokens.next(), tokens.next())
        else {
            break;
        };
        let Ok(label) = label.parse::<i32>() else {
            debug!("清单在第 {} 条记录处截断: {:?}", entries.len(), label);
            break;
        };
        entries.push(ManifestEntry {
            index: entries.len(),
            image1: image1.to_owned(),
            image2: image2.to_owned(),
            label,
        });
    }

    entries
}

/// 读取清单文件
pub fn read_manifest(path: impl AsRef<Path>) -> Result<Vec<ManifestEntry>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("读取清单文件失败: {}", path.display()))?;
    Ok(parse_manifest(&content))
}

/// 均匀随机打乱清单顺序，每条记录的 index 不变
pub fn shuffle_entries<R: Rng + ?Sized>(entries: &mut [ManifestEntry], rng: &mut R) {
    entries.shuffle(rng);
}

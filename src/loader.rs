use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use image::imageops::FilterType;

/// 读取图片时使用的色彩模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// 单通道灰度图
    Gray,
    /// 三通道彩色图，通道顺序为 BGR
    Color,
}

impl ColorMode {
    pub fn channels(self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Color => 3,
        }
    }
}

/// 读取图片后的缩放方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resize {
    /// 保持原始尺寸
    Native,
    /// 缩放到指定尺寸
    To { width: u32, height: u32 },
}

impl Resize {
    /// 宽高必须都大于 0 才会缩放
    pub fn new(width: u32, height: u32) -> Self {
        if width > 0 && height > 0 { Self::To { width, height } } else { Self::Native }
    }
}

/// 按 HWC 顺序排列的 8 位像素数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(channels: usize, height: usize, width: usize, data: Vec<u8>) -> Result<Self> {
        ensure!(
            data.len() == channels * height * width,
            "像素数据长度 {} 与形状 {}x{}x{} 不符",
            data.len(),
            channels,
            height,
            width
        );
        Ok(Self { channels, height, width, data })
    }

    /// 第 h 行第 w 列的第 c 个通道
    pub fn sample(&self, c: usize, h: usize, w: usize) -> u8 {
        self.data[(h * self.width + w) * self.channels + c]
    }
}

/// 读取一张图片
pub fn load_image(path: impl AsRef<Path>, resize: Resize, color: ColorMode) -> Result<PixelBuffer> {
    let path = path.as_ref();
    let mut img = image::open(path).with_context(|| format!("读取图片失败: {}", path.display()))?;

    if let Resize::To { width, height } = resize {
        if img.width() != width || img.height() != height {
            img = img.resize_exact(width, height, FilterType::Triangle);
        }
    }

    let (width, height) = (img.width() as usize, img.height() as usize);
    let data = match color {
        ColorMode::Gray => img.into_luma8().into_raw(),
        ColorMode::Color => {
            let mut data = img.into_rgb8().into_raw();
            // RGB -> BGR
            data.chunks_exact_mut(3).for_each(|px| px.swap(0, 2));
            data
        }
    };

    PixelBuffer::new(color.channels(), height, width, data)
}

/// 拼接根目录和清单中的路径
///
/// 直接做字符串拼接而不是 `Path::join`：绝对路径也会被放在根目录下，
/// 根目录不以 `/` 结尾时作为文件名前缀
pub fn resolve_path(root: &Path, image: &str) -> PathBuf {
    let mut path = root.as_os_str().to_owned();
    path.push(image);
    PathBuf::from(path)
}

/// 读取一对图片，任意一张失败则整体失败
pub fn load_pair(
    root: impl AsRef<Path>,
    image1: &str,
    image2: &str,
    resize: Resize,
    color: ColorMode,
) -> Result<(PixelBuffer, PixelBuffer)> {
    let root = root.as_ref();
    let img1 = load_image(resolve_path(root, image1), resize, color)?;
    let img2 = load_image(resolve_path(root, image2), resize, color)?;
    Ok((img1, img2))
}

use anyhow::{Result, ensure};
use clap::ValueEnum;
use prost::Message;

use crate::loader::PixelBuffer;

/// 图片的压缩编码格式
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Png,
    #[value(alias = "jpeg")]
    Jpg,
    Bmp,
}

/// 打包选项
#[derive(Debug, Clone, Default)]
pub struct PackOptions {
    /// 以压缩编码的形式保存图片，目前总是 None，即保存原始像素
    pub encoding: Option<Encoding>,
}

/// 存储在数据库中的一条记录
///
/// `data` 按通道分块平铺：先是图片 1 的所有通道，再是图片 2 的所有通道，
/// 每个通道是一个按行排列的 height × width 平面
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datum {
    pub channels: u32,
    pub height: u32,
    pub width: u32,
    pub label: i32,
    pub encoded: bool,
    pub data: Vec<u8>,
}

/// caffe.proto 中的 Datum 消息（proto2），字段按 tag 顺序排列
#[derive(Clone, PartialEq, Message)]
struct DatumProto {
    #[prost(int32, optional, tag = "1")]
    channels: Option<i32>,
    #[prost(int32, optional, tag = "2")]
    height: Option<i32>,
    #[prost(int32, optional, tag = "3")]
    width: Option<i32>,
    #[prost(bytes = "vec", optional, tag = "4")]
    data: Option<Vec<u8>>,
    #[prost(int32, optional, tag = "5")]
    label: Option<i32>,
    #[prost(float, repeated, packed = "false", tag = "6")]
    float_data: Vec<f32>,
    #[prost(bool, optional, tag = "7")]
    encoded: Option<bool>,
}

impl Datum {
    /// 序列化为 protobuf，所有字段都显式写入，float_data 为空
    pub fn to_bytes(&self) -> Vec<u8> {
        DatumProto {
            channels: Some(self.channels as i32),
            height: Some(self.height as i32),
            width: Some(self.width as i32),
            data: Some(self.data.clone()),
            label: Some(self.label),
            float_data: vec![],
            encoded: Some(self.encoded),
        }
        .encode_to_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let proto = DatumProto::decode(bytes)?;
        ensure!(proto.float_data.is_empty(), "不支持 float_data");
        Ok(Self {
            channels: proto.channels.unwrap_or_default().max(0) as u32,
            height: proto.height.unwrap_or_default().max(0) as u32,
            width: proto.width.unwrap_or_default().max(0) as u32,
            label: proto.label.unwrap_or_default(),
            encoded: proto.encoded.unwrap_or_default(),
            data: proto.data.unwrap_or_default(),
        })
    }

    /// 按形状计算的数据大小
    pub fn data_size(&self) -> usize {
        self.channels as usize * self.height as usize * self.width as usize
    }
}

/// 将两张尺寸相同的图片打包为一条记录
///
/// 两张图片的宽高必须一致，通道数也必须一致
pub fn pack_pair(img1: &PixelBuffer, img2: &PixelBuffer, label: i32, options: &PackOptions) -> Result<Datum> {
    ensure!(
        img1.height == img2.height && img1.width == img2.width,
        "图片尺寸不一致: {}x{} != {}x{}",
        img1.height,
        img1.width,
        img2.height,
        img2.width
    );
    ensure!(
        img1.channels == img2.channels,
        "图片通道数不一致: {} != {}",
        img1.channels,
        img2.channels
    );
    ensure!(options.encoding.is_none(), "暂不支持编码存储: {:?}", options.encoding);

    let (height, width) = (img1.height, img1.width);
    let plane = height * width;
    let channels = img1.channels + img2.channels;
    let mut data = vec![0u8; channels * plane];

    for (offset, img) in [(0, img1), (img1.channels, img2)] {
        for h in 0..height {
            for w in 0..width {
                for c in 0..img.channels {
                    data[((offset + c) * height + h) * width + w] = img.sample(c, h, w);
                }
            }
        }
    }

    Ok(Datum {
        channels: channels as u32,
        height: height as u32,
        width: width as u32,
        label,
        encoded: false,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(data: [u8; 4]) -> PixelBuffer {
        PixelBuffer::new(1, 2, 2, data.to_vec()).unwrap()
    }

    #[test]
    fn test_pack_gray_layout() {
        let img1 = gray([1, 2, 3, 4]);
        let img2 = gray([5, 6, 7, 8]);
        let datum = pack_pair(&img1, &img2, 9, &PackOptions::default()).unwrap();

        assert_eq!((datum.channels, datum.height, datum.width), (2, 2, 2));
        assert_eq!(datum.label, 9);
        assert!(!datum.encoded);
        assert_eq!(datum.data, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(datum.data_size(), datum.data.len());
    }

    #[test]
    fn test_pack_color_is_planar() {
        // 1x2 的三通道图片，像素值 = 通道 * 10 + 列
        let img1 = PixelBuffer::new(3, 1, 2, vec![0, 10, 20, 1, 11, 21]).unwrap();
        let img2 = PixelBuffer::new(3, 1, 2, vec![100, 110, 120, 101, 111, 121]).unwrap();
        let datum = pack_pair(&img1, &img2, 0, &PackOptions::default()).unwrap();

        assert_eq!(datum.channels, 6);
        assert_eq!(datum.data, vec![0, 1, 10, 11, 20, 21, 100, 101, 110, 111, 120, 121]);
        for c in 0..6 {
            for w in 0..2 {
                let src = if c < 3 { img1.sample(c, 0, w) } else { img2.sample(c - 3, 0, w) };
                assert_eq!(datum.data[c * 2 + w], src);
            }
        }
    }

    #[test]
    fn test_pack_rejects_mismatched_shape() {
        let img1 = gray([0; 4]);
        let img2 = PixelBuffer::new(1, 1, 4, vec![0; 4]).unwrap();
        assert!(pack_pair(&img1, &img2, 0, &PackOptions::default()).is_err());

        let img3 = PixelBuffer::new(3, 2, 2, vec![0; 12]).unwrap();
        assert!(pack_pair(&img1, &img3, 0, &PackOptions::default()).is_err());
    }

    #[test]
    fn test_pack_rejects_encoding() {
        let img = gray([0; 4]);
        let options = PackOptions { encoding: Some(Encoding::Png) };
        assert!(pack_pair(&img, &img, 0, &options).is_err());
    }

    #[test]
    fn test_protobuf_wire_bytes() {
        let datum = pack_pair(&gray([1, 2, 3, 4]), &gray([5, 6, 7, 8]), 3, &PackOptions::default()).unwrap();
        let bytes = datum.to_bytes();
        #[rustfmt::skip]
        let expected = [
            0x08, 2, // channels
            0x10, 2, // height
            0x18, 2, // width
            0x22, 8, 1, 2, 3, 4, 5, 6, 7, 8, // data
            0x28, 3, // label
            0x38, 0, // encoded
        ];
        assert_eq!(bytes, expected);
        assert_eq!(Datum::from_bytes(&bytes).unwrap(), datum);
    }

    #[test]
    fn test_protobuf_negative_label() {
        let datum = pack_pair(&gray([0; 4]), &gray([0; 4]), -3, &PackOptions::default()).unwrap();
        let bytes = datum.to_bytes();
        // proto2 的负 int32 编码为 10 字节 varint
        let label = bytes.iter().position(|&b| b == 0x28).unwrap();
        assert_eq!(&bytes[label + 1..label + 11], &[0xfd, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01]);
        assert_eq!(Datum::from_bytes(&bytes).unwrap().label, -3);
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        let bytes = pack_pair(&gray([1, 2, 3, 4]), &gray([5, 6, 7, 8]), 1, &PackOptions::default())
            .unwrap()
            .to_bytes();
        // data 字段被截断
        assert!(Datum::from_bytes(&bytes[..10]).is_err());
    }
}

//! 图块的编码与解码.

use super::{StoreError, StoreResult};
use crate::data::{ColorTile, LabelTile};
use image::{ColorType, DynamicImage, ImageBuffer, Luma};
use ndarray::{Array2, Array3, ArrayBase, ArrayViewD, Data, Dimension, Ix2};
use ndarray_npy::{read_npy, write_npy, ReadNpyError};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype::Gray32, TiffEncoder};

/// 表明一个可以 **按原样** 持久化存储为 8-bit 图像的对象.
///
/// 支持 `(h, w)` 灰度, 以及 `(h, w, c)` 且 `c` 为 1 (灰度), 3 (RGB), 4 (RGBA) 的数组.
pub trait ImgWriteRaw {
    /// 按原样将图片保存到 `path` 路径. 编码格式由扩展名决定.
    fn save_raw<P: AsRef<Path>>(&self, path: P) -> StoreResult<()>;
}

/// 表明一个可以持久化存储的实例标签掩码.
pub trait LabelWrite {
    /// 将标签掩码保存到 `path` 路径.
    ///
    /// 扩展名为 `npy` 时按 `u32` 原样存储, 为 `tif`/`tiff` 时存为 32-bit 单通道 TIFF;
    /// 否则存为 16-bit 单通道图像, 此时若存在大于 `u16::MAX` 的编号则返回
    /// [`StoreError::LabelOutOfRange`].
    fn save_label<P: AsRef<Path>>(&self, path: P) -> StoreResult<()>;
}

impl<S: Data<Elem = u8>, D: Dimension> ImgWriteRaw for ArrayBase<S, D> {
    fn save_raw<P: AsRef<Path>>(&self, path: P) -> StoreResult<()> {
        encode_u8(self.view().into_dyn(), path.as_ref())
    }
}

impl<S: Data<Elem = u32>> LabelWrite for ArrayBase<S, Ix2> {
    fn save_label<P: AsRef<Path>>(&self, path: P) -> StoreResult<()> {
        let path = path.as_ref();
        if is_npy(path) {
            write_npy(path, self)?;
            return Ok(());
        }
        check_layout(self.shape())?;
        let (h, w) = self.dim();
        if is_tiff(path) {
            let raw: Vec<u32> = self.iter().copied().collect();
            let mut encoder = TiffEncoder::new(BufWriter::new(File::create(path)?))?;
            encoder.write_image::<Gray32>(w as u32, h as u32, &raw)?;
            return Ok(());
        }
        let raw = self
            .iter()
            .map(|&v| u16::try_from(v))
            .collect::<Result<Vec<u16>, _>>()
            .map_err(|_| StoreError::LabelOutOfRange(path.to_owned()))?;
        let buf = ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(w as u32, h as u32, raw)
            .ok_or_else(|| StoreError::UnsupportedLayout(self.shape().to_vec()))?;
        buf.save(path)?;
        Ok(())
    }
}

/// 检查形状是否能编码为图像. 写出一批图块之前应先对每块调用, 以免产生部分写入.
pub(crate) fn check_layout(shape: &[usize]) -> StoreResult<()> {
    let ok = match shape {
        [h, w] => *h > 0 && *w > 0,
        [h, w, c] => *h > 0 && *w > 0 && matches!(c, 1 | 3 | 4),
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(StoreError::UnsupportedLayout(shape.to_vec()))
    }
}

fn encode_u8(view: ArrayViewD<u8>, path: &Path) -> StoreResult<()> {
    check_layout(view.shape())?;
    let (h, w) = (view.shape()[0] as u32, view.shape()[1] as u32);
    let color = match view.shape().get(2) {
        None | Some(1) => ColorType::L8,
        Some(3) => ColorType::Rgb8,
        _ => ColorType::Rgba8,
    };
    // 逻辑顺序迭代即行优先, 与图像缓冲区布局一致.
    let raw: Vec<u8> = view.iter().copied().collect();
    image::save_buffer(path, &raw, w, h, color)?;
    Ok(())
}

/// 判断路径是否是 npy 文件.
#[inline]
pub(crate) fn is_npy(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("npy"))
}

#[inline]
fn is_tiff(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
}

/// 按文件原有通道数读取 8-bit 图像, 得到 `(h, w, c)` 数组.
///
/// 灰度加透明通道的图像转换为 RGBA (`c = 4`), 因此 `c` 总能被 [`ImgWriteRaw`] 写回.
/// 非 8-bit 图像返回 [`StoreError::UnsupportedPixel`].
pub fn read_color<P: AsRef<Path>>(path: P) -> StoreResult<ColorTile> {
    let path = path.as_ref();
    let (w, h, c, raw) = match image::open(path)? {
        DynamicImage::ImageLuma8(b) => (b.width(), b.height(), 1, b.into_raw()),
        img @ DynamicImage::ImageLumaA8(_) => {
            let b = img.into_rgba8();
            (b.width(), b.height(), 4, b.into_raw())
        }
        DynamicImage::ImageRgb8(b) => (b.width(), b.height(), 3, b.into_raw()),
        DynamicImage::ImageRgba8(b) => (b.width(), b.height(), 4, b.into_raw()),
        other => {
            return Err(StoreError::UnsupportedPixel(
                path.to_owned(),
                format!("{:?}", other.color()),
            ))
        }
    };
    Ok(Array3::from_shape_vec((h as usize, w as usize, c), raw)?)
}

/// 读取任意图像并转换为 RGB, 得到 `(h, w, 3)` 数组. 用于颜色特征.
pub fn read_rgb<P: AsRef<Path>>(path: P) -> StoreResult<ColorTile> {
    let buf = image::open(path.as_ref())?.into_rgb8();
    let (w, h) = buf.dimensions();
    Ok(Array3::from_shape_vec(
        (h as usize, w as usize, 3),
        buf.into_raw(),
    )?)
}

/// 读取实例标签掩码.
///
/// 支持 8/16-bit 单通道 PNG/TIFF, 32/64-bit 整数单通道 TIFF, 以及元素为
/// `u32`, `u16`, `u8`, `i32`, `i64`, `u64` 的二维 npy 文件.
/// 负数或超出 `u32` 的编号返回 [`StoreError::LabelOutOfRange`].
pub fn read_label<P: AsRef<Path>>(path: P) -> StoreResult<LabelTile> {
    let path = path.as_ref();
    if is_npy(path) {
        return read_npy_label(path);
    }
    if is_tiff(path) {
        if let Some(tile) = read_wide_tiff_label(path)? {
            return Ok(tile);
        }
    }
    let (w, h, raw): (u32, u32, Vec<u32>) = match image::open(path)? {
        DynamicImage::ImageLuma8(b) => (
            b.width(),
            b.height(),
            b.into_raw().into_iter().map(u32::from).collect(),
        ),
        DynamicImage::ImageLuma16(b) => (
            b.width(),
            b.height(),
            b.into_raw().into_iter().map(u32::from).collect(),
        ),
        other => {
            return Err(StoreError::UnsupportedPixel(
                path.to_owned(),
                format!("{:?}", other.color()),
            ))
        }
    };
    Ok(Array2::from_shape_vec((h as usize, w as usize), raw)?)
}

/// `image` 不支持 32/64-bit 单通道 TIFF, 这里直接解码. 其他位深返回 `None`.
fn read_wide_tiff_label(path: &Path) -> StoreResult<Option<LabelTile>> {
    let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;
    if !matches!(decoder.colortype()?, tiff::ColorType::Gray(32 | 64)) {
        return Ok(None);
    }
    let (w, h) = decoder.dimensions()?;
    let shape = (h as usize, w as usize);
    let tile = match decoder.read_image()? {
        DecodingResult::U32(v) => Array2::from_shape_vec(shape, v)?,
        DecodingResult::U64(v) => convert_label(Array2::from_shape_vec(shape, v)?, path)?,
        DecodingResult::I32(v) => convert_label(Array2::from_shape_vec(shape, v)?, path)?,
        DecodingResult::I64(v) => convert_label(Array2::from_shape_vec(shape, v)?, path)?,
        _ => {
            return Err(StoreError::UnsupportedPixel(
                path.to_owned(),
                "floating point tiff".to_string(),
            ))
        }
    };
    Ok(Some(tile))
}

/// 按元素类型依次尝试. 只有描述符不匹配时才尝试下一个类型.
macro_rules! try_npy {
    ($path: expr, $($ty: ty),+) => {
        $(
            match read_npy::<_, Array2<$ty>>($path) {
                Ok(arr) => return convert_label(arr, $path),
                Err(ReadNpyError::WrongDescriptor(_)) => {}
                Err(e) => return Err(e.into()),
            }
        )+
    };
}

fn read_npy_label(path: &Path) -> StoreResult<LabelTile> {
    try_npy!(path, u32, u16, u8, i32, i64, u64);
    Err(StoreError::UnsupportedPixel(
        path.to_owned(),
        "npy dtype".to_string(),
    ))
}

fn convert_label<T>(arr: Array2<T>, path: &Path) -> StoreResult<LabelTile>
where
    T: Copy + TryInto<u32>,
{
    let mut out = LabelTile::zeros(arr.dim());
    for (o, &v) in out.iter_mut().zip(arr.iter()) {
        *o = v
            .try_into()
            .map_err(|_| StoreError::LabelOutOfRange(path.to_owned()))?;
    }
    Ok(out)
}

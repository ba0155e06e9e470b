//! 图块存储的运行时错误.

use crate::grid::{GridPos, ParseNameError};
use image::ImageError;
use ndarray::ShapeError;
use ndarray_npy::{ReadNpyError, WriteNpyError};
use std::fmt;
use std::io;
use std::path::PathBuf;
use tiff::TiffError;

/// 读写图块目录时的错误.
#[derive(Debug)]
pub enum StoreError {
    /// 底层 I/O 错误.
    Io(io::Error),

    /// 图像编解码错误.
    Image(ImageError),

    /// 32-bit TIFF 标签编解码错误.
    Tiff(TiffError),

    /// 读取 npy 文件错误.
    ReadNpy(ReadNpyError),

    /// 写入 npy 文件错误.
    WriteNpy(WriteNpyError),

    /// 像素数据与声明的形状不符.
    Shape(ShapeError),

    /// 写出目标目录非空, 且未开启覆写.
    NotEmpty(PathBuf),

    /// 不支持的通道布局. 参数为数组形状.
    UnsupportedLayout(Vec<usize>),

    /// 文件的像素类型不符合预期 (例如把彩色图当作标签掩码读取).
    ///
    /// 依次为文件路径和实际像素类型.
    UnsupportedPixel(PathBuf, String),

    /// 标签值无法以目标格式表示 (负数、超出 `u32`, 或 PNG/TIFF 无法容纳的大编号).
    LabelOutOfRange(PathBuf),

    /// 条目名无法解析为块名.
    InvalidName(ParseNameError),

    /// 目录中没有任何图块. 通常意味着外部分割进程没有产出.
    Empty(PathBuf),

    /// 同一个网格坐标出现了两次.
    Duplicate(GridPos),

    /// 分级布局下, 图块目录里缺少约定路径的图像.
    MissingArtifact(PathBuf),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O 错误: {e}"),
            Self::Image(e) => write!(f, "图像编解码错误: {e}"),
            Self::Tiff(e) => write!(f, "TIFF 编解码错误: {e}"),
            Self::ReadNpy(e) => write!(f, "读取 npy 错误: {e}"),
            Self::WriteNpy(e) => write!(f, "写入 npy 错误: {e}"),
            Self::Shape(e) => write!(f, "形状错误: {e}"),
            Self::NotEmpty(p) => write!(
                f,
                "base_dir {} is not empty, use force=True option if you want to rewrite files",
                p.display()
            ),
            Self::UnsupportedLayout(shape) => write!(f, "不支持的图像形状 {shape:?}"),
            Self::UnsupportedPixel(p, kind) => {
                write!(f, "{} 的像素类型 {kind} 不受支持", p.display())
            }
            Self::LabelOutOfRange(p) => write!(f, "{} 中的标签值超出可表示范围", p.display()),
            Self::InvalidName(e) => e.fmt(f),
            Self::Empty(p) => write!(f, "{} 中没有任何图块", p.display()),
            Self::Duplicate(pos) => write!(f, "网格坐标 ({}, {}) 重复出现", pos.x, pos.y),
            Self::MissingArtifact(p) => write!(f, "缺少图块文件 {}", p.display()),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Image(e) => Some(e),
            Self::Tiff(e) => Some(e),
            Self::ReadNpy(e) => Some(e),
            Self::WriteNpy(e) => Some(e),
            Self::Shape(e) => Some(e),
            Self::InvalidName(e) => Some(e),
            _ => None,
        }
    }
}

macro_rules! impl_from {
    ($($source: ty => $variant: ident),+ $(,)?) => {
        $(
            impl From<$source> for StoreError {
                #[inline]
                fn from(value: $source) -> Self {
                    Self::$variant(value)
                }
            }
        )+
    };
}

impl_from!(
    io::Error => Io,
    ImageError => Image,
    TiffError => Tiff,
    ReadNpyError => ReadNpy,
    WriteNpyError => WriteNpy,
    ShapeError => Shape,
    ParseNameError => InvalidName,
);

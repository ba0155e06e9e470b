//! 特征提取的运行时错误.

use crate::grid::{GridPos, TileName};
use crate::store::StoreError;
use ndarray::ShapeError;
use std::fmt;
use std::io;

/// 特征提取时的错误.
#[derive(Debug)]
pub enum ExtractError {
    /// 读取图块失败.
    Store(StoreError),

    /// 标签掩码没有对应的原图图块.
    MissingOriginal(TileName),

    /// 标签掩码与原图的空间形状不一致. 依次为块名、掩码形状和原图形状.
    ShapeMismatch(TileName, Vec<usize>, Vec<usize>),

    /// 写出特征表失败.
    Io(io::Error),

    /// 特征表形状错误.
    Shape(ShapeError),

    /// 网格坐标不在给定的网格布局内.
    OutsideLayout(GridPos),

    /// 无法识别的特征名.
    UnknownFeature(String),

    /// 没有请求任何特征.
    NoFeatures,

    /// 无法创建工作线程池.
    #[cfg(feature = "rayon")]
    Pool(rayon::ThreadPoolBuildError),
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => e.fmt(f),
            Self::MissingOriginal(name) => write!(f, "图块 {name} 缺少对应的原图"),
            Self::ShapeMismatch(name, l, o) => {
                write!(f, "图块 {name} 的标签形状 {l:?} 与原图形状 {o:?} 不一致")
            }
            Self::Io(e) => write!(f, "I/O 错误: {e}"),
            Self::Shape(e) => write!(f, "特征表形状错误: {e}"),
            Self::OutsideLayout(pos) => {
                write!(f, "网格坐标 ({}, {}) 不在网格布局内", pos.x, pos.y)
            }
            Self::UnknownFeature(s) => write!(f, "无法识别的特征 `{s}`"),
            Self::NoFeatures => write!(f, "没有请求任何特征"),
            #[cfg(feature = "rayon")]
            Self::Pool(e) => write!(f, "无法创建线程池: {e}"),
        }
    }
}

impl std::error::Error for ExtractError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::Shape(e) => Some(e),
            #[cfg(feature = "rayon")]
            Self::Pool(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for ExtractError {
    #[inline]
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<io::Error> for ExtractError {
    #[inline]
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<ShapeError> for ExtractError {
    #[inline]
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}

#[cfg(feature = "rayon")]
impl From<rayon::ThreadPoolBuildError> for ExtractError {
    #[inline]
    fn from(value: rayon::ThreadPoolBuildError) -> Self {
        Self::Pool(value)
    }
}

//! 拼接运行时错误.

use crate::grid::GridPos;
use crate::store::StoreError;
use ndarray::ShapeError;
use std::fmt;

/// 拼接时的错误. 均为致命错误, 不做插值或跳过.
#[derive(Debug)]
pub enum MosaicError {
    /// 读取图块目录失败.
    Store(StoreError),

    /// 坐标矩形 `[0, x_max] x [0, y_max]` 中缺少某块.
    MissingTile(GridPos),

    /// 没有任何图块.
    NoTiles,

    /// 出现了已知布局之外的图块.
    OutsideLayout(GridPos),

    /// 图块形状 `(h, w)` 与布局不符. 依次为坐标, 期望形状, 实际形状.
    ExtentMismatch(GridPos, (usize, usize), (usize, usize)),

    /// 相邻图块形状不一致, 无法拼接.
    Shape(ShapeError),

    /// 重编号后的实例编号超出 `u32`. 参数为溢出发生的图块.
    LabelOverflow(GridPos),
}

impl fmt::Display for MosaicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => e.fmt(f),
            Self::MissingTile(pos) => write!(f, "缺少图块 ({}, {})", pos.x, pos.y),
            Self::NoTiles => write!(f, "没有可拼接的图块"),
            Self::OutsideLayout(pos) => write!(f, "图块 ({}, {}) 不在网格布局内", pos.x, pos.y),
            Self::ExtentMismatch(pos, expected, found) => write!(
                f,
                "图块 ({}, {}) 的形状应为 {expected:?}, 实际为 {found:?}",
                pos.x, pos.y
            ),
            Self::Shape(e) => write!(f, "图块形状无法拼接: {e}"),
            Self::LabelOverflow(pos) => {
                write!(f, "图块 ({}, {}) 重编号后实例编号溢出", pos.x, pos.y)
            }
        }
    }
}

impl std::error::Error for MosaicError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            Self::Shape(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for MosaicError {
    #[inline]
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<ShapeError> for MosaicError {
    #[inline]
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}

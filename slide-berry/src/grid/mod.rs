//! 网格切分.
//!
//! 把一张大图按块数或块尺寸切成互不重叠的矩形图块, 并为每块标注网格坐标.

mod error;
mod name;

pub use error::PartitionError;
pub use name::{ParseNameError, TileName};

use crate::Idx2d;
use itertools::iproduct;
use ndarray::{Array, ArrayBase, Axis, Data, Dimension, Slice};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 切分运行时错误.
pub type PartitionResult<T> = Result<T, PartitionError>;

/// 网格坐标. `x` 对应宽 (列) 方向, `y` 对应高 (行) 方向, 均从 0 开始.
///
/// 比较顺序为先 `x` 后 `y`, 与切分时的枚举顺序一致.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridPos {
    /// 宽方向索引.
    pub x: usize,

    /// 高方向索引.
    pub y: usize,
}

impl GridPos {
    /// 直接构造.
    #[inline]
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// 行优先 (先 `y` 后 `x`) 的排序键.
    #[inline]
    pub const fn row_major_key(&self) -> (usize, usize) {
        (self.y, self.x)
    }
}

/// 切分方式: 按块数或按块尺寸. 两者互斥.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GridSpec {
    /// 每个轴上的块数.
    Count {
        /// 宽方向块数.
        x: usize,
        /// 高方向块数.
        y: usize,
    },

    /// 每个轴上的块尺寸. 实际块数为 `轴长 / 块尺寸` (向下取整).
    Size {
        /// 宽方向块尺寸.
        x: usize,
        /// 高方向块尺寸.
        y: usize,
    },
}

impl GridSpec {
    /// 从四个可选参数构造. 必须恰好给出完整的一组 (块数对或块尺寸对).
    pub fn from_options(
        x_tiles_cnt: Option<usize>,
        y_tiles_cnt: Option<usize>,
        x_tile_size: Option<usize>,
        y_tile_size: Option<usize>,
    ) -> PartitionResult<Self> {
        match (x_tiles_cnt, y_tiles_cnt, x_tile_size, y_tile_size) {
            (Some(x), Some(y), None, None) => Ok(Self::Count { x, y }),
            (None, None, Some(x), Some(y)) => Ok(Self::Size { x, y }),
            (None, None, None, None) => Err(PartitionError::MissingSpec),
            _ => Err(PartitionError::ConflictingSpec),
        }
    }

    /// 对形状为 `(h, w)` 的图像求 (宽方向块数, 高方向块数).
    pub fn counts(&self, (h, w): Idx2d) -> PartitionResult<(usize, usize)> {
        let (x_cnt, y_cnt) = match *self {
            Self::Count { x, y } => (x, y),
            Self::Size { x, y } => {
                if x == 0 || y == 0 {
                    return Err(PartitionError::ZeroTileSize);
                }
                (w / x, h / y)
            }
        };
        for (axis, cnt, len) in [("x", x_cnt, w), ("y", y_cnt, h)] {
            if cnt == 0 {
                return Err(PartitionError::EmptyAxis(axis));
            }
            if cnt > len {
                return Err(PartitionError::TooManyTiles(axis, cnt, len));
            }
        }
        Ok((x_cnt, y_cnt))
    }
}

/// 把长为 `len` 的轴等分为 `count` 段, 返回 `count + 1` 个刻度.
///
/// 刻度由线性插值四舍五入得到, 因此每段长度为 `floor(len / count)` 或 `ceil(len / count)`.
pub fn ticks(len: usize, count: usize) -> Vec<usize> {
    debug_assert!(count > 0);
    (0..=count)
        .map(|i| (2 * i * len + count) / (2 * count))
        .collect()
}

/// 一次切分的网格布局: 图像形状与两个轴上的刻度.
///
/// 后续阶段 (特征提取) 可以通过它求出每个图块在原图中的精确原点.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridLayout {
    base: String,
    shape: Idx2d,
    x_ticks: Vec<usize>,
    y_ticks: Vec<usize>,
}

impl GridLayout {
    /// 按 `spec` 为形状 `(h, w)` 的图像计算布局.
    pub fn new(base: impl Into<String>, shape: Idx2d, spec: GridSpec) -> PartitionResult<Self> {
        let (x_cnt, y_cnt) = spec.counts(shape)?;
        Ok(Self {
            base: base.into(),
            shape,
            x_ticks: ticks(shape.1, x_cnt),
            y_ticks: ticks(shape.0, y_cnt),
        })
    }

    /// 块名前缀.
    #[inline]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// 原图形状 `(h, w)`.
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.shape
    }

    /// 宽方向刻度.
    #[inline]
    pub fn x_ticks(&self) -> &[usize] {
        &self.x_ticks
    }

    /// 高方向刻度.
    #[inline]
    pub fn y_ticks(&self) -> &[usize] {
        &self.y_ticks
    }

    /// 宽方向块数.
    #[inline]
    pub fn x_tiles(&self) -> usize {
        self.x_ticks.len() - 1
    }

    /// 高方向块数.
    #[inline]
    pub fn y_tiles(&self) -> usize {
        self.y_ticks.len() - 1
    }

    /// 图块总数.
    #[inline]
    pub fn len(&self) -> usize {
        self.x_tiles() * self.y_tiles()
    }

    /// 布局是否不含任何图块? 合法构造的布局总是返回 `false`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 按切分顺序 (外层 `x` 升序, 内层 `y` 升序) 迭代所有网格坐标.
    pub fn positions(&self) -> impl Iterator<Item = GridPos> {
        iproduct!(0..self.x_tiles(), 0..self.y_tiles()).map(|(x, y)| GridPos::new(x, y))
    }

    /// 网格坐标 `pos` 对应的图块在原图中的原点 `(h, w)`. 越界时返回 `None`.
    pub fn origin(&self, pos: GridPos) -> Option<Idx2d> {
        if pos.x >= self.x_tiles() || pos.y >= self.y_tiles() {
            return None;
        }
        Some((self.y_ticks[pos.y], self.x_ticks[pos.x]))
    }

    /// 网格坐标 `pos` 对应的图块形状 `(h, w)`. 越界时返回 `None`.
    pub fn extent(&self, pos: GridPos) -> Option<Idx2d> {
        let (h0, w0) = self.origin(pos)?;
        Some((self.y_ticks[pos.y + 1] - h0, self.x_ticks[pos.x + 1] - w0))
    }

    /// 网格坐标 `pos` 对应的块名.
    #[inline]
    pub fn name(&self, pos: GridPos) -> TileName {
        TileName::new(self.base.as_str(), pos)
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "serde")] {
        use std::fs::File;
        use std::io::{BufReader, BufWriter};
        use std::path::Path;

        /// 布局的持久化存储. 布局文件不应放进图块目录内部, 否则会被当作图块.
        impl GridLayout {
            /// 以 `bincode` 格式保存到 `path`.
            pub fn save<P: AsRef<Path>>(&self, path: P) -> bincode::Result<()> {
                let w = BufWriter::new(File::create(path.as_ref())?);
                bincode::serialize_into(w, self)
            }

            /// 从 `path` 读取 `bincode` 格式的布局.
            pub fn open<P: AsRef<Path>>(path: P) -> bincode::Result<Self> {
                let r = BufReader::new(File::open(path.as_ref())?);
                bincode::deserialize_from(r)
            }
        }
    }
}

/// 一个图块: 原图的一块矩形子区域, 连同块名 (含网格坐标) 和在原图中的原点.
#[derive(Clone, Debug)]
pub struct Tile<A, D: Dimension> {
    /// 块名.
    pub name: TileName,

    /// 在原图中的原点 `(h, w)`.
    pub origin: Idx2d,

    /// 图块像素, 与原图维数相同.
    pub data: Array<A, D>,
}

/// 一次切分的全部图块, 按切分顺序排列.
#[derive(Clone, Debug)]
pub struct Partition<A, D: Dimension> {
    layout: GridLayout,
    tiles: Vec<Tile<A, D>>,
}

impl<A, D: Dimension> Partition<A, D> {
    /// 网格布局.
    #[inline]
    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    /// 按切分顺序排列的图块.
    #[inline]
    pub fn tiles(&self) -> &[Tile<A, D>] {
        &self.tiles
    }

    /// 图块个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// 是否没有图块?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// 消费自我, 获得布局和图块.
    #[inline]
    pub fn into_parts(self) -> (GridLayout, Vec<Tile<A, D>>) {
        (self.layout, self.tiles)
    }
}

/// 将 `img` 按 `spec` 切分为图块, 块名前缀为 `base`.
///
/// `img` 的前两个轴视为 `(h, w)`, 其余轴 (通常是通道) 原样保留. 图块按
/// 外层 `x` 升序、内层 `y` 升序枚举, 块名为 `{base}_{x}_{y}`.
pub fn split_image<S, A, D>(
    img: &ArrayBase<S, D>,
    spec: GridSpec,
    base: &str,
) -> PartitionResult<Partition<A, D>>
where
    S: Data<Elem = A>,
    A: Clone,
    D: Dimension,
{
    if img.ndim() < 2 {
        return Err(PartitionError::NotAnImage(img.ndim()));
    }
    let shape = (img.shape()[0], img.shape()[1]);
    let layout = GridLayout::new(base, shape, spec)?;

    let tiles = layout
        .positions()
        .map(|pos| {
            let (h0, w0) = (layout.y_ticks[pos.y], layout.x_ticks[pos.x]);
            let (h1, w1) = (layout.y_ticks[pos.y + 1], layout.x_ticks[pos.x + 1]);
            let data = img
                .slice_axis(Axis(0), Slice::from(h0..h1))
                .slice_axis(Axis(1), Slice::from(w0..w1))
                .to_owned();
            Tile {
                name: layout.name(pos),
                origin: (h0, w0),
                data,
            }
        })
        .collect();

    log::debug!(
        "Split {:?} into {} x {} tiles",
        img.shape(),
        layout.x_tiles(),
        layout.y_tiles()
    );
    Ok(Partition { layout, tiles })
}

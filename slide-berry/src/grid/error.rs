//! 切分配置错误.

use std::fmt;

/// 网格切分的配置错误. 均在任何 I/O 之前报告.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionError {
    /// 既没有给出块数, 也没有给出块尺寸.
    MissingSpec,

    /// 块数与块尺寸同时给出, 或者某一组只给出了一半.
    ConflictingSpec,

    /// 输入不是至少二维的图像. 参数为实际维数.
    NotAnImage(usize),

    /// 块尺寸为 0.
    ZeroTileSize,

    /// 某一轴的块数为 0 (例如块尺寸大于图像). 参数为轴名.
    EmptyAxis(&'static str),

    /// 某一轴的块数超过了该轴像素数, 会产生空块.
    ///
    /// 依次为轴名、块数、轴长.
    TooManyTiles(&'static str, usize, usize),
}

impl fmt::Display for PartitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSpec | Self::ConflictingSpec => {
                write!(f, "Specify tiles count OR tiles size.")
            }
            Self::NotAnImage(ndim) => write!(f, "需要至少二维的图像, 但输入是 {ndim} 维"),
            Self::ZeroTileSize => write!(f, "块尺寸不能为 0"),
            Self::EmptyAxis(axis) => write!(f, "{axis} 轴上没有任何图块"),
            Self::TooManyTiles(axis, cnt, len) => {
                write!(f, "{axis} 轴长 {len}, 无法切分为 {cnt} 块")
            }
        }
    }
}

impl std::error::Error for PartitionError {}

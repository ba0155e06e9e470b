//! 内存中的图像与标签掩码.
//!
//! 图像一律以 `ndarray` 数组表示: 彩色图块为 `(h, w, c)` 的 `u8` 数组,
//! 标签掩码为 `(h, w)` 的 `u32` 数组 (0 为背景).

mod orient;
mod stage;

use ndarray::{Array2, Array3, ArrayView2, ArrayView3};

pub use orient::{flip_width, normalize_orientation, rot90_cw};
pub use stage::ToStaged;

/// 拥有所有权的彩色 (或灰度) 图块, 形状 `(h, w, c)`.
pub type ColorTile = Array3<u8>;

/// 彩色图块的只读视图.
pub type ColorView<'a> = ArrayView3<'a, u8>;

/// 拥有所有权的实例标签掩码, 形状 `(h, w)`.
pub type LabelTile = Array2<u32>;

/// 标签掩码的只读视图.
pub type LabelView<'a> = ArrayView2<'a, u32>;

/// 标签掩码中的最大实例编号. 全背景 (或空掩码) 时返回 0.
#[inline]
pub fn max_label(labels: LabelView) -> u32 {
    labels.iter().copied().max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_max_label() {
        assert_eq!(max_label(array![[0, 3], [7, 0]].view()), 7);
        assert_eq!(max_label(Array2::<u32>::zeros((2, 2)).view()), 0);
        assert_eq!(max_label(Array2::<u32>::zeros((0, 0)).view()), 0);
    }
}

//! 写出前的像素规范化. 外部网络只接受 8-bit 图像.

use ndarray::{Array, ArrayView, Dimension};

/// 可以规范化为 8-bit 像素的元素类型.
pub trait ToStaged: Copy {
    /// 将 `view` 转换为 8-bit 数组.
    fn to_staged<D: Dimension>(view: ArrayView<'_, Self, D>) -> Array<u8, D>;
}

/// 8-bit 像素原样通过.
impl ToStaged for u8 {
    #[inline]
    fn to_staged<D: Dimension>(view: ArrayView<'_, Self, D>) -> Array<u8, D> {
        view.to_owned()
    }
}

macro_rules! impl_float_staged {
    ($($fp: ty),+) => {
        $(
            /// 若所有值都在 `[0, 1]` 内, 则放大到 `[0, 255]`; 否则视为已经是 8-bit 范围,
            /// 饱和截断到 `0..=255`. NaN 写作 0.
            impl ToStaged for $fp {
                fn to_staged<D: Dimension>(view: ArrayView<'_, Self, D>) -> Array<u8, D> {
                    let unit = view.iter().all(|v| (0.0..=1.0).contains(v));
                    if unit {
                        view.mapv(|v| (v * 255.0) as u8)
                    } else {
                        view.mapv(|v| num::clamp(v, 0.0, 255.0) as u8)
                    }
                }
            }
        )+
    };
}

impl_float_staged!(f32, f64);

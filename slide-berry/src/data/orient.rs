//! 方向归一化.
//!
//! 外部网络输出的掩码与输入图块之间存在固定的方向差异. 特征提取前, 掩码和原图必须施加
//! **完全相同** 的变换, 否则形状与颜色特征会错位. 所有变换都只修改视图的步长, 不复制数据.

use ndarray::{ArrayView, Axis, Dimension};

/// 顺时针旋转 90°: 先转置两个空间轴, 再翻转宽方向.
///
/// 前两个轴视为 `(h, w)`, 其余轴不变.
#[inline]
pub fn rot90_cw<A, D: Dimension>(mut view: ArrayView<'_, A, D>) -> ArrayView<'_, A, D> {
    view.swap_axes(0, 1);
    view.invert_axis(Axis(1));
    view
}

/// 翻转宽方向 (第二个轴).
#[inline]
pub fn flip_width<A, D: Dimension>(mut view: ArrayView<'_, A, D>) -> ArrayView<'_, A, D> {
    view.invert_axis(Axis(1));
    view
}

/// 网络输出的方向归一化: [`rot90_cw`] 后接 [`flip_width`].
///
/// 两步合起来等价于交换两个空间轴, 即归一化后第一个轴是原图块的宽 (`x`) 方向,
/// 第二个轴是高 (`y`) 方向.
#[inline]
pub fn normalize_orientation<A, D: Dimension>(view: ArrayView<'_, A, D>) -> ArrayView<'_, A, D> {
    flip_width(rot90_cw(view))
}

//! 8-邻域相关的边缘提取操作.

mod contour;

pub use contour::trace_external;

use crate::Idx2d;

/// 8 个邻居方向 `(dh, dw)`, 从正西开始按顺时针排列.
pub(crate) const CW_DIRS: [(isize, isize); 8] = [
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
];

/// 沿方向 `dir` (见 [`CW_DIRS`]) 走一步. 不检查越界, 负方向越界时回绕为极大值.
#[inline]
pub(crate) fn step((h, w): Idx2d, dir: usize) -> Idx2d {
    let (dh, dw) = CW_DIRS[dir % 8];
    (h.wrapping_add_signed(dh), w.wrapping_add_signed(dw))
}

/// 获得 `(h, w)` 的 8-邻居索引, 从正西开始顺时针排列. 不检查越界.
#[inline]
pub(crate) fn neighbour8(pos: Idx2d) -> [Idx2d; 8] {
    std::array::from_fn(|dir| step(pos, dir))
}

/// `to` 相对于 `from` 的方向. 两者不是 8-相邻时返回 `None`.
#[inline]
pub(crate) fn direction(from: Idx2d, to: Idx2d) -> Option<usize> {
    neighbour8(from).iter().position(|&p| p == to)
}

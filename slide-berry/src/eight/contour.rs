//! Moore 邻域外轮廓追踪.

use super::{direction, step};
use crate::Idx2d;
use ndarray::ArrayView2;

/// 追踪二值掩码中第一个前景连通域 (按 8-连通) 的外轮廓.
///
/// 起点为光栅序 (先行后列) 中第一个前景像素. 返回的轮廓首尾相连 (首点不重复),
/// 按顺时针方向排列. 掩码全为背景时返回空.
///
/// 掩码外的区域视为背景.
pub fn trace_external(mask: ArrayView2<bool>) -> Vec<Idx2d> {
    let is_fg = |pos: Idx2d| matches!(mask.get(pos), Some(&true));

    let start = match mask.indexed_iter().find(|(_, &v)| v) {
        None => return vec![],
        Some((pos, _)) => pos,
    };

    // 起点的西邻居必为背景, 从那里开始回溯.
    let mut contour = vec![start];
    let mut cur = start;
    let mut back = 0;
    let mut second: Option<Idx2d> = None;

    // 每个 (像素, 回溯方向) 状态至多出现一次.
    let cap = 8 * mask.iter().filter(|&&v| v).count() + 8;
    for _ in 0..cap {
        let mut next = None;
        for k in 1..=8 {
            let dir = (back + k) % 8;
            let p = step(cur, dir);
            if is_fg(p) {
                next = Some((p, step(cur, dir + 7)));
                break;
            }
        }

        let (p, checked) = match next {
            // 孤立像素.
            None => return contour,
            Some(v) => v,
        };

        // Jacob 停止准则: 以同样的方式再次离开起点.
        if cur == start && second == Some(p) {
            break;
        }
        if second.is_none() {
            second = Some(p);
        }

        back = match direction(p, checked) {
            Some(d) => d,
            None => break,
        };
        cur = p;
        if cur != start {
            contour.push(cur);
        }
    }
    contour
}

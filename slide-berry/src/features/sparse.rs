//! 稀疏实例索引.
//!
//! 一次稳定排序即可把标签掩码中的全部实例像素按编号分组: 所有坐标存放在一块连续的数组里,
//! 另有一张以实例序号为下标的区间表. 区间表的长度只取决于实际出现的实例个数,
//! 与编号的数值大小无关. 逐实例计算时只需访问该实例的外接矩形,
//! 而不必为每个编号扫描整张掩码.

use crate::consts::label::is_instance;
use crate::data::LabelView;
use crate::Idx2d;
use std::ops::Range;

/// 外接矩形 `[h0, h1) x [w0, w1)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Bbox {
    /// 高方向起点 (含).
    pub h0: usize,
    /// 宽方向起点 (含).
    pub w0: usize,
    /// 高方向终点 (不含).
    pub h1: usize,
    /// 宽方向终点 (不含).
    pub w1: usize,
}

impl Bbox {
    /// 左上角.
    #[inline]
    pub fn origin(&self) -> Idx2d {
        (self.h0, self.w0)
    }

    /// 形状 `(h, w)`.
    #[inline]
    pub fn shape(&self) -> Idx2d {
        (self.h1 - self.h0, self.w1 - self.w0)
    }

    /// 包含 `pixels` 中全部坐标的最小矩形. `pixels` 为空时返回 `None`.
    pub fn enclosing(pixels: &[Idx2d]) -> Option<Self> {
        let (&(h, w), rest) = pixels.split_first()?;
        let init = Bbox {
            h0: h,
            w0: w,
            h1: h + 1,
            w1: w + 1,
        };
        Some(rest.iter().fold(init, |b, &(h, w)| Bbox {
            h0: b.h0.min(h),
            w0: b.w0.min(w),
            h1: b.h1.max(h + 1),
            w1: b.w1.max(w + 1),
        }))
    }
}

/// 按实例编号分组的像素坐标.
#[derive(Clone, Debug)]
pub struct SparseIndex {
    /// 出现过的实例编号, 升序.
    ids: Vec<u32>,
    /// `starts[i]..starts[i + 1]` 为编号 `ids[i]` 在 `coords` 中的区间.
    starts: Vec<usize>,
    coords: Vec<Idx2d>,
}

impl SparseIndex {
    /// 为标签掩码建立索引. 每个实例的坐标按光栅序 (先行后列) 排列.
    pub fn build(labels: LabelView) -> Self {
        let mut pairs: Vec<(u32, Idx2d)> = labels
            .indexed_iter()
            .filter(|(_, &v)| is_instance(v))
            .map(|(pos, &v)| (v, pos))
            .collect();
        // 稳定排序保持同一编号内的光栅序.
        pairs.sort_by_key(|&(v, _)| v);

        let mut ids = Vec::new();
        let mut starts = Vec::new();
        for (i, &(v, _)) in pairs.iter().enumerate() {
            if ids.last() != Some(&v) {
                ids.push(v);
                starts.push(i);
            }
        }
        starts.push(pairs.len());
        let coords = pairs.into_iter().map(|(_, pos)| pos).collect();
        Self {
            ids,
            starts,
            coords,
        }
    }

    /// 出现过的实例编号, 升序.
    #[inline]
    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    /// 最大实例编号. 全背景时为 0.
    #[inline]
    pub fn max_id(&self) -> u32 {
        self.ids.last().copied().unwrap_or(0)
    }

    fn range(&self, id: u32) -> Range<usize> {
        match self.ids.binary_search(&id) {
            Ok(i) => self.starts[i]..self.starts[i + 1],
            Err(_) => 0..0,
        }
    }

    /// 编号 `id` 的全部像素坐标. 背景或不存在的编号返回空切片.
    #[inline]
    pub fn pixels(&self, id: u32) -> &[Idx2d] {
        &self.coords[self.range(id)]
    }

    /// 编号 `id` 的像素个数.
    #[inline]
    pub fn count(&self, id: u32) -> usize {
        self.range(id).len()
    }

    /// 编号 `id` 的外接矩形. 该编号没有像素时返回 `None`.
    #[inline]
    pub fn bbox(&self, id: u32) -> Option<Bbox> {
        Bbox::enclosing(self.pixels(id))
    }
}

//! 实例标签重编号.
//!
//! 每块掩码中的实例编号 `1..=k` 只在块内有意义. 合并时按行优先序 (先 `y` 后 `x`)
//! 访问图块, 每块的非零编号加上当前偏移, 随后偏移更新为平移后块内的最大编号.
//! 背景 (0) 永远不参与平移.
//!
//! 顺序版本是一个以偏移为累加器的折叠; 由于块 `i` 的偏移恰好等于前 `i` 块局部最大编号之和,
//! 并行版本先并行求各块最大编号, 再以排他前缀和得到偏移, 结果与顺序版本逐像素相同.

use super::{MosaicError, MosaicResult, Tiles};
use crate::consts::label::is_instance;
use crate::data::{max_label, LabelTile};
use crate::grid::GridPos;

/// 每块在访问顺序中被施加的偏移.
pub type Offsets = Vec<(GridPos, u32)>;

/// 按行优先序排列的可变图块引用.
fn visits(tiles: &mut Tiles<LabelTile>) -> Vec<(&GridPos, &mut LabelTile)> {
    let mut v: Vec<_> = tiles.iter_mut().collect();
    v.sort_by_key(|(pos, _)| pos.row_major_key());
    v
}

/// 将 `tile` 中所有非零编号加上 `offset`, 返回平移后的块内最大编号 (全背景时为 0).
///
/// 若平移会溢出 `u32` 则返回 `None`, 此时 `tile` 不被修改.
pub fn shift_labels(tile: &mut LabelTile, offset: u32) -> Option<u32> {
    let local_max = max_label(tile.view());
    if local_max == 0 {
        return Some(0);
    }
    let shifted_max = local_max.checked_add(offset)?;
    shift_unchecked(tile, offset);
    Some(shifted_max)
}

#[inline]
fn shift_unchecked(tile: &mut LabelTile, offset: u32) {
    tile.mapv_inplace(|v| if is_instance(v) { v + offset } else { v });
}

/// 顺序重编号. 返回每块在访问顺序中被施加的偏移.
///
/// 全背景图块不改变偏移, 因此偏移在访问顺序上单调不减.
pub fn merge_labels(tiles: &mut Tiles<LabelTile>) -> MosaicResult<Offsets> {
    let visits = visits(tiles);
    let mut applied = Vec::with_capacity(visits.len());

    let last = visits.into_iter().try_fold(0u32, |offset, (&pos, tile)| {
        let shifted_max = shift_labels(tile, offset).ok_or(MosaicError::LabelOverflow(pos))?;
        applied.push((pos, offset));
        Ok::<u32, MosaicError>(offset.max(shifted_max))
    })?;

    log::debug!("Merged {} label tiles, max id {last}", applied.len());
    Ok(applied)
}

/// 排他前缀和. 溢出时返回溢出发生的下标.
pub fn exclusive_prefix_sum(maxima: &[u32]) -> Result<Vec<u32>, usize> {
    let mut out = Vec::with_capacity(maxima.len());
    let mut acc = 0u32;
    for (i, &m) in maxima.iter().enumerate() {
        out.push(acc);
        acc = acc.checked_add(m).ok_or(i)?;
    }
    Ok(out)
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, IntoParallelRefMutIterator, ParallelIterator};

        /// 借助 `rayon` 的并行重编号. 结果与 [`merge_labels`] 完全一致.
        pub fn par_merge_labels(tiles: &mut Tiles<LabelTile>) -> MosaicResult<Offsets> {
            let mut visits = visits(tiles);
            let maxima: Vec<u32> = visits
                .par_iter()
                .map(|(_, tile)| max_label(tile.view()))
                .collect();
            let offsets = exclusive_prefix_sum(&maxima)
                .map_err(|i| MosaicError::LabelOverflow(*visits[i].0))?;

            visits
                .par_iter_mut()
                .zip(offsets.par_iter())
                .for_each(|((_, tile), &offset)| shift_unchecked(tile, offset));

            Ok(visits.iter().map(|(pos, _)| **pos).zip(offsets).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};
    use std::collections::{BTreeMap, HashMap, HashSet};

    fn sample_tiles() -> Tiles<LabelTile> {
        let mut tiles = BTreeMap::new();
        tiles.insert(GridPos::new(0, 0), array![[0, 1, 1], [2, 0, 3]]);
        tiles.insert(GridPos::new(1, 0), array![[1, 1, 0], [0, 2, 2]]);
        // 全背景块.
        tiles.insert(GridPos::new(0, 1), Array2::zeros((2, 3)));
        tiles.insert(GridPos::new(1, 1), array![[4, 0, 0], [0, 0, 1]]);
        tiles
    }

    #[test]
    fn test_row_major_offsets() {
        let mut tiles = sample_tiles();
        let offsets = merge_labels(&mut tiles).unwrap();
        assert_eq!(
            offsets,
            [
                (GridPos::new(0, 0), 0),
                (GridPos::new(1, 0), 3),
                (GridPos::new(0, 1), 5),
                (GridPos::new(1, 1), 5),
            ]
        );
        assert_eq!(tiles[&GridPos::new(1, 0)], array![[4, 4, 0], [0, 5, 5]]);
        assert_eq!(tiles[&GridPos::new(0, 1)], Array2::<u32>::zeros((2, 3)));
        assert_eq!(tiles[&GridPos::new(1, 1)], array![[9, 0, 0], [0, 0, 6]]);
    }

    #[test]
    fn test_unique_ids_and_background() {
        let original = sample_tiles();
        let mut tiles = original.clone();
        merge_labels(&mut tiles).unwrap();

        // (块, 局部编号) -> 全局编号 必须是单射.
        let mut seen: HashMap<u32, (GridPos, u32)> = HashMap::new();
        for (pos, tile) in tiles.iter() {
            for (&g, &l) in tile.iter().zip(original[pos].iter()) {
                assert_eq!(l == 0, g == 0);
                if l == 0 {
                    continue;
                }
                let prev = seen.insert(g, (*pos, l));
                assert!(prev.is_none() || prev == Some((*pos, l)));
            }
        }
        let ids: HashSet<u32> = seen.keys().copied().collect();
        assert_eq!(ids.len(), 3 + 2 + 2);
    }

    #[test]
    fn test_monotonic_offsets() {
        let mut tiles = sample_tiles();
        let before: HashMap<GridPos, u32> = tiles
            .iter()
            .map(|(p, t)| (*p, max_label(t.view())))
            .collect();
        let offsets = merge_labels(&mut tiles).unwrap();
        for w in offsets.windows(2) {
            let (pos, off) = w[0];
            assert!(w[1].1 >= off);
            if before[&pos] > 0 {
                assert!(w[1].1 > off);
            }
        }
    }

    #[test]
    fn test_overflow() {
        let mut tiles = BTreeMap::new();
        tiles.insert(GridPos::new(0, 0), array![[u32::MAX - 1]]);
        tiles.insert(GridPos::new(1, 0), array![[2]]);
        assert!(matches!(
            merge_labels(&mut tiles),
            Err(MosaicError::LabelOverflow(p)) if p == GridPos::new(1, 0)
        ));
    }

    #[test]
    fn test_prefix_sum() {
        assert_eq!(exclusive_prefix_sum(&[3, 0, 2, 5]), Ok(vec![0, 3, 3, 5]));
        assert_eq!(exclusive_prefix_sum(&[]), Ok(vec![]));
        assert_eq!(exclusive_prefix_sum(&[u32::MAX, 1]), Err(1));
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn test_parallel_matches_sequential() {
        let mut seq = sample_tiles();
        let mut par = sample_tiles();
        let a = merge_labels(&mut seq).unwrap();
        let b = par_merge_labels(&mut par).unwrap();
        assert_eq!(a, b);
        assert_eq!(seq, par);
    }
}

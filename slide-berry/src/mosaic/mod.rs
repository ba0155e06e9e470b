//! 拼接: 把图块目录还原为一张完整图像.
//!
//! 同一 `y` 的图块沿宽方向拼接为一行, 各行再沿高方向堆叠. 坐标矩形
//! `[0, x_max] x [0, y_max]` 中必须不缺任何一块.
//!
//! 若已知切分时的 [`GridLayout`], 可用 `*_with` 系列函数按布局检查:
//! 整行或整列缺失也会被发现, 而不是得到一张被截断的图.
//!
//! 标签掩码可选择 [`LabelMode::Merge`], 在拼接前把每块的局部实例编号平移为全局唯一编号,
//! 见 [`relabel`].

mod error;
pub mod relabel;

pub use error::MosaicError;
pub use relabel::{merge_labels, shift_labels};

#[cfg(feature = "rayon")]
pub use relabel::par_merge_labels;

use crate::data::{ColorTile, LabelTile};
use crate::grid::{GridLayout, GridPos};
use crate::store::{color_loader, label_loader, TileLoader, TileStore};
use ndarray::{concatenate, Array, Axis, RemoveAxis};
use std::collections::BTreeMap;

/// 拼接运行时错误.
pub type MosaicResult<T> = Result<T, MosaicError>;

/// 以网格坐标为键的图块集合.
pub type Tiles<T> = BTreeMap<GridPos, T>;

/// 标签掩码的拼接方式.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LabelMode {
    /// 原样拼接, 块内编号不变.
    #[default]
    Keep,

    /// 按行优先序累加偏移, 使全局实例编号唯一.
    Merge,
}

/// 检查 `tiles` 的键恰好铺满 `[0, x_max] x [0, y_max]`, 返回 `(x_max, y_max)`.
fn check_complete<T>(tiles: &Tiles<T>) -> MosaicResult<(usize, usize)> {
    if tiles.is_empty() {
        return Err(MosaicError::NoTiles);
    }
    let (x_max, y_max) = tiles
        .keys()
        .fold((0, 0), |(x, y), p| (x.max(p.x), y.max(p.y)));
    for y in 0..=y_max {
        for x in 0..=x_max {
            let pos = GridPos::new(x, y);
            if !tiles.contains_key(&pos) {
                return Err(MosaicError::MissingTile(pos));
            }
        }
    }
    Ok((x_max, y_max))
}

/// 检查 `tiles` 恰好覆盖 `layout` 的全部坐标, 且每块的 `(h, w)` 与布局一致.
fn check_against<A, D>(tiles: &Tiles<Array<A, D>>, layout: &GridLayout) -> MosaicResult<()>
where
    D: RemoveAxis,
{
    if let Some(pos) = layout.positions().find(|p| !tiles.contains_key(p)) {
        return Err(MosaicError::MissingTile(pos));
    }
    for (&pos, tile) in tiles {
        let expected = layout.extent(pos).ok_or(MosaicError::OutsideLayout(pos))?;
        let found = (tile.shape()[0], tile.shape()[1]);
        if found != expected {
            return Err(MosaicError::ExtentMismatch(pos, expected, found));
        }
    }
    Ok(())
}

/// 把内存中的图块拼接为完整数组.
///
/// 图块的前两个轴视为 `(h, w)`. 同一行图块高度不同, 或同一列图块宽度不同时返回
/// [`MosaicError::Shape`].
pub fn assemble<A, D>(tiles: &Tiles<Array<A, D>>) -> MosaicResult<Array<A, D>>
where
    A: Clone,
    D: RemoveAxis,
{
    let (x_max, y_max) = check_complete(tiles)?;

    let mut rows = Vec::with_capacity(y_max + 1);
    for y in 0..=y_max {
        let row: Vec<_> = (0..=x_max)
            .filter_map(|x| tiles.get(&GridPos::new(x, y)))
            .map(|t| t.view())
            .collect();
        rows.push(concatenate(Axis(1), &row)?);
    }
    let rows: Vec<_> = rows.iter().map(|r| r.view()).collect();
    Ok(concatenate(Axis(0), &rows)?)
}

/// 读取加载器中的全部图块. 任一块读取失败即返回 `Err`.
fn collect_tiles<T>(loader: TileLoader<T>) -> MosaicResult<Tiles<T>> {
    let mut tiles = BTreeMap::new();
    for (name, data) in loader {
        tiles.insert(name.pos(), data?);
    }
    Ok(tiles)
}

/// 从图块目录还原彩色 (或灰度) 图像, 形状 `(h, w, c)`.
pub fn restore_image(store: &TileStore) -> MosaicResult<ColorTile> {
    let tiles = collect_tiles(color_loader(store)?)?;
    let img = assemble(&tiles)?;
    log::info!(
        "Restored image {:?} from {} tiles in {}",
        img.shape(),
        tiles.len(),
        store.root().display()
    );
    Ok(img)
}

/// 从图块目录还原实例标签图, 形状 `(h, w)`.
#[inline]
pub fn restore_labels(store: &TileStore, mode: LabelMode) -> MosaicResult<LabelTile> {
    restore_labels_with(store, mode, None)
}

/// 同 [`restore_labels`]. 给出 `layout` 时, 图块必须与布局逐一对应.
pub fn restore_labels_with(
    store: &TileStore,
    mode: LabelMode,
    layout: Option<&GridLayout>,
) -> MosaicResult<LabelTile> {
    let mut tiles = collect_tiles(label_loader(store)?)?;
    check_complete(&tiles)?;
    if let Some(layout) = layout {
        check_against(&tiles, layout)?;
    }
    if mode == LabelMode::Merge {
        merge_labels(&mut tiles)?;
    }
    let labels = assemble(&tiles)?;
    log::info!(
        "Restored labels {:?} ({mode:?}) from {} tiles in {}",
        labels.shape(),
        tiles.len(),
        store.root().display()
    );
    Ok(labels)
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        /// [`restore_labels`] 在 [`LabelMode::Merge`] 下的并行版本, 结果与之完全一致.
        #[inline]
        pub fn par_restore_labels(store: &TileStore) -> MosaicResult<LabelTile> {
            par_restore_labels_with(store, None)
        }

        /// [`restore_labels_with`] 在 [`LabelMode::Merge`] 下的并行版本.
        pub fn par_restore_labels_with(
            store: &TileStore,
            layout: Option<&GridLayout>,
        ) -> MosaicResult<LabelTile> {
            let mut tiles = collect_tiles(label_loader(store)?)?;
            check_complete(&tiles)?;
            if let Some(layout) = layout {
                check_against(&tiles, layout)?;
            }
            par_merge_labels(&mut tiles)?;
            let labels = assemble(&tiles)?;
            log::info!(
                "Restored labels {:?} (parallel merge) from {} tiles in {}",
                labels.shape(),
                tiles.len(),
                store.root().display()
            );
            Ok(labels)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::max_label;
    use crate::grid::{split_image, GridSpec};
    use crate::store::testing::scratch_dir;
    use crate::store::{LabelWrite, StoreError, TileWriter};
    use ndarray::{array, Array2, Array3};
    use std::collections::HashSet;
    use std::fs;

    #[test]
    fn test_concrete_round_trip() {
        let root = scratch_dir("mosaic-concrete");
        let img =
            Array3::<u8>::from_shape_fn((1000, 1000, 3), |(h, w, c)| ((h * 7 + w * 3 + c) % 251) as u8);
        let p = split_image(&img, GridSpec::Size { x: 500, y: 500 }, "slide").unwrap();
        assert_eq!(p.len(), 4);

        let store = TileWriter::new(&root).write(&p).unwrap();
        for name in ["slide_0_0", "slide_0_1", "slide_1_0", "slide_1_1"] {
            assert!(root.join(name).join("images").join(format!("{name}.png")).is_file());
        }
        assert_eq!(restore_image(&store).unwrap(), img);
    }

    #[test]
    fn test_uneven_gray_round_trip() {
        let root = scratch_dir("mosaic-gray");
        let img = Array2::<u8>::from_shape_fn((37, 53), |(h, w)| (h * 53 + w) as u8);
        let p = split_image(&img, GridSpec::Count { x: 3, y: 4 }, "g").unwrap();
        let store = TileWriter::new(&root).write(&p).unwrap();
        let back = restore_image(&store).unwrap();
        assert_eq!(back, img.insert_axis(Axis(2)));
    }

    #[test]
    fn test_missing_tile() {
        let root = scratch_dir("mosaic-missing");
        let img = Array3::<u8>::zeros((8, 8, 3));
        let p = split_image(&img, GridSpec::Count { x: 2, y: 2 }, "m").unwrap();
        let store = TileWriter::new(&root).write(&p).unwrap();
        fs::remove_dir_all(root.join("m_1_0")).unwrap();
        assert!(matches!(
            restore_image(&store),
            Err(MosaicError::MissingTile(p)) if p == GridPos::new(1, 0)
        ));
    }

    #[test]
    fn test_empty_store() {
        let root = scratch_dir("mosaic-empty");
        assert!(matches!(
            restore_image(&TileStore::staged(&root)),
            Err(MosaicError::Store(StoreError::Empty(_)))
        ));
        assert!(matches!(
            assemble::<u8, ndarray::Ix2>(&Tiles::new()),
            Err(MosaicError::NoTiles)
        ));
    }

    #[test]
    fn test_shape_mismatch() {
        let mut tiles = Tiles::new();
        tiles.insert(GridPos::new(0, 0), Array2::<u8>::zeros((2, 2)));
        tiles.insert(GridPos::new(1, 0), Array2::<u8>::zeros((3, 2)));
        assert!(matches!(assemble(&tiles), Err(MosaicError::Shape(_))));
    }

    fn write_label_tiles() -> std::path::PathBuf {
        let dir = scratch_dir("mosaic-labels");
        let tiles = [
            ((0, 0), array![[1, 1], [0, 2]]),
            ((1, 0), array![[0, 1], [1, 1]]),
            ((0, 1), array![[0, 0], [0, 0]]),
            ((1, 1), array![[3, 0], [0, 1]]),
        ];
        for ((x, y), t) in tiles {
            let t: Array2<u32> = t;
            t.save_label(dir.join(format!("pred_{x}_{y}.png"))).unwrap();
        }
        dir
    }

    #[test]
    fn test_restore_labels_modes() {
        let dir = write_label_tiles();
        let store = TileStore::flat(&dir);

        let kept = restore_labels(&store, LabelMode::Keep).unwrap();
        assert_eq!(
            kept,
            array![[1, 1, 0, 1], [0, 2, 1, 1], [0, 0, 3, 0], [0, 0, 0, 1]]
        );

        let merged = restore_labels(&store, LabelMode::Merge).unwrap();
        assert_eq!(
            merged,
            array![[1, 1, 0, 3], [0, 2, 3, 3], [0, 0, 6, 0], [0, 0, 0, 4]]
        );
        let ids: HashSet<u32> = merged.iter().copied().filter(|&v| v > 0).collect();
        assert_eq!(ids.len(), 2 + 1 + 2);
        assert_eq!(max_label(merged.view()), 6);
    }

    #[test]
    fn test_layout_catches_dropped_column() {
        let dir = scratch_dir("mosaic-dropped");
        let labels = Array2::<u32>::from_shape_fn((10, 10), |(h, w)| ((h + w) % 3) as u32);
        let p = split_image(&labels, GridSpec::Count { x: 2, y: 2 }, "pred").unwrap();
        for tile in p.tiles().iter().filter(|t| t.name.pos().x == 0) {
            tile.data.save_label(dir.join(format!("{}.png", tile.name))).unwrap();
        }
        let store = TileStore::flat(&dir);

        // 只看现有图块时, 整列缺失无从发现.
        assert_eq!(restore_labels(&store, LabelMode::Merge).unwrap().dim(), (10, 5));
        assert!(matches!(
            restore_labels_with(&store, LabelMode::Merge, Some(p.layout())),
            Err(MosaicError::MissingTile(pos)) if pos == GridPos::new(1, 0)
        ));

        for tile in p.tiles() {
            tile.data.save_label(dir.join(format!("{}.png", tile.name))).unwrap();
        }
        assert_eq!(
            restore_labels_with(&store, LabelMode::Keep, Some(p.layout())).unwrap(),
            labels
        );
    }

    #[test]
    fn test_layout_rejects_foreign_tiles() {
        let labels = Array2::<u32>::zeros((6, 6));
        let p = split_image(&labels, GridSpec::Count { x: 2, y: 2 }, "pred").unwrap();

        let dir = scratch_dir("mosaic-outside");
        for x in 0..3 {
            for y in 0..2 {
                Array2::<u32>::zeros((3, 3))
                    .save_label(dir.join(format!("pred_{x}_{y}.png")))
                    .unwrap();
            }
        }
        assert!(matches!(
            restore_labels_with(&TileStore::flat(&dir), LabelMode::Keep, Some(p.layout())),
            Err(MosaicError::OutsideLayout(pos)) if pos == GridPos::new(2, 0)
        ));

        let dir = scratch_dir("mosaic-extent");
        for x in 0..2 {
            for y in 0..2 {
                Array2::<u32>::zeros((2, 2))
                    .save_label(dir.join(format!("pred_{x}_{y}.png")))
                    .unwrap();
            }
        }
        assert!(matches!(
            restore_labels_with(&TileStore::flat(&dir), LabelMode::Keep, Some(p.layout())),
            Err(MosaicError::ExtentMismatch(_, (3, 3), (2, 2)))
        ));
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn test_par_restore_labels() {
        let dir = write_label_tiles();
        let store = TileStore::flat(&dir);
        assert_eq!(
            par_restore_labels(&store).unwrap(),
            restore_labels(&store, LabelMode::Merge).unwrap()
        );

        let layout = GridLayout::new("pred", (4, 4), GridSpec::Count { x: 2, y: 2 }).unwrap();
        assert_eq!(
            par_restore_labels_with(&store, Some(&layout)).unwrap(),
            restore_labels(&store, LabelMode::Merge).unwrap()
        );
        let wide = GridLayout::new("pred", (4, 6), GridSpec::Count { x: 3, y: 2 }).unwrap();
        assert!(matches!(
            par_restore_labels_with(&store, Some(&wide)),
            Err(MosaicError::MissingTile(pos)) if pos == GridPos::new(2, 0)
        ));
    }
}

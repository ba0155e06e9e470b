//! 细胞核特征提取.
//!
//! 输入为两个目录: 外部分割网络输出的逐块标签掩码 (扁平布局), 以及切分时写出的原图图块
//! (分级布局). 两者以块名配对. 对每一块:
//!
//! 1. 对标签掩码与原图做相同的方向归一化 (顺时针旋转 90° 后左右翻转, 即交换两个空间轴);
//! 2. 枚举块内的实例编号, 为每个实例计算所请求的特征;
//! 3. 把位置类特征平移到全局坐标系.
//!
//! 每个实例产出特征表中的一行. 几何退化 (如椭圆拟合失败) 只影响该实例的对应列, 以 0 填充.

mod error;
mod instance;
mod kind;
mod sparse;
mod table;

pub use error::ExtractError;
pub use kind::{column_names, FeatureKind};
pub use sparse::{Bbox, SparseIndex};
pub use table::FeatureTable;

use crate::consts::label::is_instance;
use crate::data::{normalize_orientation, ColorView, LabelView};
use crate::grid::{GridLayout, GridPos, TileName};
use crate::store::{read_label, read_rgb, TileStore};
use instance::{Instance, Offset};
use ndarray::{s, Array2};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// 特征提取运行时错误.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// 每块中参与计算的实例编号范围.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum InstanceBound {
    /// `1..=max_id`.
    #[default]
    Inclusive,

    /// `1..max_id`. 编号最大的实例不会产出特征行.
    Exclusive,
}

impl InstanceBound {
    /// 块内最大编号为 `max_id` 时, 编号 `id` 是否参与计算.
    #[inline]
    pub fn contains(self, id: u32, max_id: u32) -> bool {
        match self {
            Self::Inclusive => (1..=max_id).contains(&id),
            Self::Exclusive => (1..max_id).contains(&id),
        }
    }
}

/// 逐实例的遍历策略. 两者结果完全相同.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Strategy {
    /// 每个编号扫描整张图块.
    Dense,

    /// 先建立 [`SparseIndex`], 每个实例只访问其外接矩形.
    #[default]
    Sparse,
}

/// 特征提取选项.
#[derive(Clone, Debug)]
pub struct ExtractorOptions {
    /// 请求的特征, 按输出列的顺序.
    pub features: Vec<FeatureKind>,

    /// 全局 `x` 坐标的附加平移.
    pub x_min: f64,

    /// 全局 `y` 坐标的附加平移.
    pub y_min: f64,

    /// 实例编号范围.
    pub bound: InstanceBound,

    /// 遍历策略.
    pub strategy: Strategy,

    /// 切分时的网格布局. 给出时使用精确的图块原点, 否则以 `块坐标 x 块尺寸` 近似.
    pub layout: Option<GridLayout>,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self::new(FeatureKind::ALL.to_vec())
    }
}

impl ExtractorOptions {
    /// 以默认设置请求 `features`.
    pub fn new(features: Vec<FeatureKind>) -> Self {
        Self {
            features,
            x_min: 0.0,
            y_min: 0.0,
            bound: InstanceBound::default(),
            strategy: Strategy::default(),
            layout: None,
        }
    }

    /// 每行的列数.
    #[inline]
    pub fn width(&self) -> usize {
        self.features.iter().map(|k| k.width()).sum()
    }

    /// 网格坐标为 `pos`、方向归一化后形状为 `oriented` 的图块在全局坐标系中的平移量.
    fn offset(&self, pos: GridPos, oriented: (usize, usize)) -> ExtractResult<Offset> {
        let (x0, y0) = match &self.layout {
            Some(layout) => {
                let (h0, w0) = layout
                    .origin(pos)
                    .ok_or(ExtractError::OutsideLayout(pos))?;
                (w0, h0)
            }
            None => (pos.x * oriented.0, pos.y * oriented.1),
        };
        Ok((x0 as f64 + self.x_min, y0 as f64 + self.y_min))
    }
}

/// 计算一块的全部特征行, 按实例编号升序, 按行展平.
///
/// `labels` 与 `original` 为读取所得的原始方向, 其空间形状必须一致.
pub fn extract_tile(
    name: &TileName,
    labels: LabelView,
    original: ColorView,
    options: &ExtractorOptions,
) -> ExtractResult<Vec<f64>> {
    if labels.shape()[..] != original.shape()[..2] {
        return Err(ExtractError::ShapeMismatch(
            name.clone(),
            labels.shape().to_vec(),
            original.shape().to_vec(),
        ));
    }
    let labels = normalize_orientation(labels);
    let original = normalize_orientation(original);
    let offset = options.offset(name.pos(), labels.dim())?;

    let mut rows = Vec::new();
    let mut emit = |inst: Instance| {
        for &kind in options.features.iter() {
            inst.push_features(kind, offset, &mut rows);
        }
    };

    match options.strategy {
        Strategy::Dense => {
            let present: BTreeSet<u32> =
                labels.iter().copied().filter(|&v| is_instance(v)).collect();
            let max_id = present.last().copied().unwrap_or(0);
            for id in present.into_iter().filter(|&id| options.bound.contains(id, max_id)) {
                let mask = labels.mapv(|v| v == id);
                emit(Instance::new(mask, original.view(), (0, 0)));
            }
        }
        Strategy::Sparse => {
            let index = SparseIndex::build(labels.view());
            let max_id = index.max_id();
            for &id in index.ids().iter().filter(|&&id| options.bound.contains(id, max_id)) {
                let bbox = match index.bbox(id) {
                    None => continue,
                    Some(b) => b,
                };
                let mut mask = Array2::<bool>::default(bbox.shape());
                for &(h, w) in index.pixels(id) {
                    mask[(h - bbox.h0, w - bbox.w0)] = true;
                }
                let crop = original.slice(s![bbox.h0..bbox.h1, bbox.w0..bbox.w1, ..]);
                emit(Instance::new(mask, crop, bbox.origin()));
            }
        }
    }

    log::debug!(
        "Tile {name}: {} instances",
        rows.len() / options.width().max(1)
    );
    Ok(rows)
}

/// 一块待处理的图块: 标签掩码与原图的路径.
#[derive(Clone, Debug)]
struct Job {
    name: TileName,
    labels: PathBuf,
    original: PathBuf,
}

/// 细胞核特征提取器.
#[derive(Clone, Debug)]
pub struct NucleiFeatures {
    labels: TileStore,
    originals: TileStore,
    options: ExtractorOptions,
}

impl NucleiFeatures {
    /// `label_dir` 为逐块标签掩码目录 (扁平布局), `tile_root` 为原图图块目录 (分级布局).
    pub fn new<P, Q>(label_dir: P, tile_root: Q, options: ExtractorOptions) -> ExtractResult<Self>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        if options.features.is_empty() {
            return Err(ExtractError::NoFeatures);
        }
        Ok(Self {
            labels: TileStore::flat(label_dir),
            originals: TileStore::staged(tile_root),
            options,
        })
    }

    /// 选项.
    #[inline]
    pub fn options(&self) -> &ExtractorOptions {
        &self.options
    }

    /// 输出列名.
    #[inline]
    pub fn feature_names(&self) -> Vec<&'static str> {
        column_names(&self.options.features)
    }

    /// 列出标签图块并与原图配对. 任一标签图块缺少原图即返回 `Err`.
    fn jobs(&self) -> ExtractResult<Vec<Job>> {
        self.labels
            .entries()?
            .into_iter()
            .map(|e| {
                let original = self
                    .originals
                    .find(&e.name)
                    .ok_or_else(|| ExtractError::MissingOriginal(e.name.clone()))?;
                Ok(Job {
                    name: e.name,
                    labels: e.path,
                    original,
                })
            })
            .collect()
    }

    fn run(&self, job: &Job) -> ExtractResult<Vec<f64>> {
        let labels = read_label(&job.labels)?;
        let original = read_rgb(&job.original)?;
        extract_tile(&job.name, labels.view(), original.view(), &self.options)
    }

    fn finish(&self, batches: Vec<Vec<f64>>) -> ExtractResult<FeatureTable> {
        let table = FeatureTable::from_flat(self.feature_names(), batches.concat())?;
        log::info!(
            "Extracted {} instances with {} columns",
            table.len(),
            table.columns().len()
        );
        Ok(table)
    }

    /// 逐块顺序计算特征表. 行按块 (网格坐标升序) 再按实例编号排列.
    pub fn compute(&self) -> ExtractResult<FeatureTable> {
        let jobs = self.jobs()?;
        log::info!("Computing features for {} tiles", jobs.len());
        let batches = jobs
            .iter()
            .map(|j| self.run(j))
            .collect::<ExtractResult<Vec<_>>>()?;
        self.finish(batches)
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::prelude::*;
        use std::num::NonZeroUsize;

        impl NucleiFeatures {
            /// 在 `workers` 个线程的线程池上逐块并行计算. 结果与 [`NucleiFeatures::compute`] 完全相同.
            pub fn par_compute(&self, workers: NonZeroUsize) -> ExtractResult<FeatureTable> {
                let jobs = self.jobs()?;
                log::info!(
                    "Computing features for {} tiles on {} workers",
                    jobs.len(),
                    workers
                );
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(workers.get())
                    .build()?;
                let batches = pool.install(|| {
                    jobs.par_iter()
                        .map(|j| self.run(j))
                        .collect::<ExtractResult<Vec<_>>>()
                })?;
                self.finish(batches)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{split_image, GridSpec};
    use crate::store::testing::scratch_dir;
    use crate::store::{LabelWrite, TileWriter};
    use ndarray::{Array2, Array3};

    fn single_pixel_tile() -> (Array2<u32>, Array3<u8>) {
        let mut labels = Array2::<u32>::zeros((10, 10));
        labels[(2, 3)] = 1;
        let original = Array3::<u8>::from_elem((10, 10, 3), 100);
        (labels, original)
    }

    #[test]
    fn test_single_pixel_translation() {
        // 2 x 2 网格, 每块 10 x 10, 像素位于块 (1, 1) 的第 2 行第 3 列.
        let (labels, original) = single_pixel_tile();
        let name = TileName::new("img", GridPos::new(1, 1));
        let options = ExtractorOptions::new(vec![FeatureKind::Position, FeatureKind::Size]);

        let row = extract_tile(&name, labels.view(), original.view(), &options).unwrap();
        // 方向归一化交换两个轴: x 来自列, y 来自行.
        assert_eq!(row, [3.0 + 10.0, 2.0 + 10.0, 1.0]);

        let options = ExtractorOptions {
            x_min: 0.5,
            y_min: -1.0,
            ..options
        };
        let row = extract_tile(&name, labels.view(), original.view(), &options).unwrap();
        assert_eq!(row, [13.5, 11.0, 1.0]);
    }

    #[test]
    fn test_layout_origins() {
        // 25 x 23 的图切成 2 x 2: 块原点不是块尺寸的整数倍.
        let layout = GridLayout::new("img", (25, 23), GridSpec::Count { x: 2, y: 2 }).unwrap();
        let (h0, w0) = layout.origin(GridPos::new(1, 1)).unwrap();
        let (h, w) = layout.extent(GridPos::new(1, 1)).unwrap();

        let mut labels = Array2::<u32>::zeros((h, w));
        labels[(0, 0)] = 7;
        let original = Array3::<u8>::zeros((h, w, 3));
        let name = layout.name(GridPos::new(1, 1));
        let options = ExtractorOptions {
            layout: Some(layout),
            ..ExtractorOptions::new(vec![FeatureKind::Position])
        };
        let row = extract_tile(&name, labels.view(), original.view(), &options).unwrap();
        assert_eq!(row, [w0 as f64, h0 as f64]);

        let outside = TileName::new("img", GridPos::new(2, 0));
        assert!(matches!(
            extract_tile(&outside, labels.view(), original.view(), &options),
            Err(ExtractError::OutsideLayout(_))
        ));
    }

    #[test]
    fn test_exclusive_bound_drops_max_id() {
        let labels = ndarray::array![[1, 0, 2], [0, 0, 0], [3, 0, 3]];
        let original = Array3::<u8>::zeros((3, 3, 3));
        let name = TileName::new("t", GridPos::new(0, 0));
        let mut options = ExtractorOptions::new(vec![FeatureKind::Size]);

        let rows = extract_tile(&name, labels.view(), original.view(), &options).unwrap();
        assert_eq!(rows, [1.0, 1.0, 2.0]);

        options.bound = InstanceBound::Exclusive;
        let rows = extract_tile(&name, labels.view(), original.view(), &options).unwrap();
        assert_eq!(rows, [1.0, 1.0]);
        assert!(!InstanceBound::Exclusive.contains(1, 1));
        assert!(InstanceBound::Inclusive.contains(1, 1));
        assert!(!InstanceBound::Inclusive.contains(0, 1));
    }

    #[test]
    fn test_sparse_huge_ids() {
        let labels = ndarray::array![[0, u32::MAX - 1, 5], [0, u32::MAX - 1, 0]];
        let original = Array3::<u8>::zeros((2, 3, 3));
        let name = TileName::new("t", GridPos::new(0, 0));
        for strategy in [Strategy::Dense, Strategy::Sparse] {
            let options = ExtractorOptions {
                strategy,
                ..ExtractorOptions::new(vec![FeatureKind::Size])
            };
            let rows = extract_tile(&name, labels.view(), original.view(), &options).unwrap();
            assert_eq!(rows, [1.0, 2.0]);
        }
    }

    #[test]
    fn test_absent_ids_and_shape_mismatch() {
        let labels = ndarray::array![[0, 4], [4, 0]];
        let original = Array3::<u8>::zeros((2, 2, 3));
        let name = TileName::new("t", GridPos::new(0, 0));
        for strategy in [Strategy::Dense, Strategy::Sparse] {
            let options = ExtractorOptions {
                strategy,
                ..ExtractorOptions::new(vec![FeatureKind::Size])
            };
            let rows = extract_tile(&name, labels.view(), original.view(), &options).unwrap();
            assert_eq!(rows, [2.0]);
        }

        let bad = Array3::<u8>::zeros((2, 3, 3));
        assert!(matches!(
            extract_tile(
                &name,
                labels.view(),
                bad.view(),
                &ExtractorOptions::default()
            ),
            Err(ExtractError::ShapeMismatch(..))
        ));
    }

    fn blobs() -> (Array2<u32>, Array3<u8>) {
        let labels = Array2::from_shape_fn((40, 30), |(h, w)| {
            let (dh, dw) = (h as isize - 12, w as isize - 10);
            if dh * dh * 4 + dw * dw <= 64 {
                1
            } else if (25..34).contains(&h) && (5..22).contains(&w) {
                2
            } else if h == 2 && w == 28 {
                3
            } else if (30..38).contains(&h) && (24..28).contains(&w) && (h + w) % 3 != 0 {
                5
            } else {
                0
            }
        });
        let original =
            Array3::from_shape_fn((40, 30, 3), |(h, w, c)| ((h * 31 + w * 7 + c * 50) % 256) as u8);
        (labels, original)
    }

    #[test]
    fn test_dense_matches_sparse() {
        let (labels, original) = blobs();
        let name = TileName::new("b", GridPos::new(2, 1));
        let dense = ExtractorOptions {
            strategy: Strategy::Dense,
            x_min: 3.0,
            ..ExtractorOptions::default()
        };
        let sparse = ExtractorOptions {
            strategy: Strategy::Sparse,
            ..dense.clone()
        };
        let a = extract_tile(&name, labels.view(), original.view(), &dense).unwrap();
        let b = extract_tile(&name, labels.view(), original.view(), &sparse).unwrap();
        assert_eq!(a.len(), 4 * dense.width());
        assert_eq!(a, b);
    }

    fn stage_sample() -> (PathBuf, PathBuf) {
        let root = scratch_dir("features-tiles");
        let labels_dir = scratch_dir("features-labels");
        let (labels, original) = blobs();

        let spec = GridSpec::Count { x: 2, y: 2 };
        let p = split_image(&original, spec, "s").unwrap();
        TileWriter::new(&root).write(&p).unwrap();
        let lp = split_image(&labels, spec, "s").unwrap();
        for tile in lp.tiles() {
            tile.data
                .save_label(labels_dir.join(format!("{}.tif", tile.name)))
                .unwrap();
        }
        (root, labels_dir)
    }

    #[test]
    fn test_compute_on_disk() {
        let (root, labels_dir) = stage_sample();
        let nf = NucleiFeatures::new(&labels_dir, &root, ExtractorOptions::default()).unwrap();
        assert_eq!(nf.feature_names().len(), 16);

        let table = nf.compute().unwrap();
        assert_eq!(table.columns().len(), 16);
        // 跨块的实例在每块中各产出一行.
        assert!(table.len() >= 4);
        let sizes = table.column("size").unwrap();
        let (labels, _) = blobs();
        let total = labels.iter().filter(|&&v| v > 0).count();
        assert_eq!(sizes.sum() as usize, total);
    }

    #[test]
    fn test_missing_original() {
        let (root, labels_dir) = stage_sample();
        std::fs::remove_dir_all(root.join("s_1_0")).unwrap();
        let nf = NucleiFeatures::new(&labels_dir, &root, ExtractorOptions::default()).unwrap();
        assert!(matches!(
            nf.compute(),
            Err(ExtractError::MissingOriginal(n)) if n.pos() == GridPos::new(1, 0)
        ));
        assert!(matches!(
            NucleiFeatures::new(&labels_dir, &root, ExtractorOptions::new(vec![])),
            Err(ExtractError::NoFeatures)
        ));
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn test_par_compute_matches() {
        use std::num::NonZeroUsize;

        let (root, labels_dir) = stage_sample();
        let nf = NucleiFeatures::new(&labels_dir, &root, ExtractorOptions::default()).unwrap();
        let a = nf.compute().unwrap();
        let b = nf.par_compute(NonZeroUsize::new(3).unwrap()).unwrap();
        assert_eq!(a, b);
    }
}

//! 程序运行函数.

use crate::network::Network;
use crate::result::SegmentReport;
use slide_berry::data::max_label;
use slide_berry::prelude::*;
use slide_berry::store::read_color;
use std::error::Error;
use std::fs;
use std::path::Path;
use std::time::Instant;
use utils::config::SegmentConfig;

/// 图块名前缀.
const TILE_BASE: &str = "img";

type RunResult<T> = Result<T, Box<dyn Error>>;

/// 准备派生输出目录: 非空时按 `force` 清空或报错.
fn prepare_output(dir: &Path, force: bool) -> RunResult<()> {
    let non_empty = fs::read_dir(dir).map_or(false, |mut it| it.next().is_some());
    if non_empty {
        if !force {
            return Err(format!("{} is not empty; set SLIDE_FORCE=1 to overwrite", dir.display()).into());
        }
        log::warn!("Clearing {}", dir.display());
        fs::remove_dir_all(dir)?;
    }
    Ok(())
}

/// 实际运行.
pub fn run(config: &SegmentConfig) -> RunResult<SegmentReport> {
    let mut report = SegmentReport::default();
    let features = FeatureKind::parse_list(&config.features)?;

    // 切分并写出.
    let t = Instant::now();
    let img = read_color(&config.image)?;
    report.image_shape = img.shape().to_vec();
    let size = config.tile_size.get();
    let partition = split_image(&img, GridSpec::Size { x: size, y: size }, TILE_BASE)?;
    drop(img);
    let layout = partition.layout().clone();
    report.grid = (layout.x_tiles(), layout.y_tiles());
    report.stage("split", t.elapsed());

    let t = Instant::now();
    let store = TileWriter::new(&config.sample_dir)
        .force(config.force)
        .write(&partition)?;
    drop(partition);
    layout.save(config.layout_path())?;
    report.outputs.push(config.layout_path());
    report.stage("stage tiles", t.elapsed());

    // 外部分割网络.
    let t = Instant::now();
    let network = Network::new(&config.network_dir);
    network.stage(store.root())?;
    network.predict()?;
    let segmented = config.segmented_dir();
    prepare_output(&segmented, config.force)?;
    network.collect(&segmented)?;
    report.outputs.push(segmented.clone());
    report.stage("segmentation", t.elapsed());

    // 拼接全局标签图. 网络漏掉任何一块都是致命错误.
    let t = Instant::now();
    let labels = par_restore_labels_with(&TileStore::flat(&segmented), Some(&layout))?;
    report.instances = max_label(labels.view());
    labels.save_label(config.labels_path())?;
    report.outputs.push(config.labels_path());
    report.stage("restore labels", t.elapsed());

    // 细胞核特征.
    let t = Instant::now();
    let options = ExtractorOptions {
        layout: Some(layout),
        ..ExtractorOptions::new(features)
    };
    let table = NucleiFeatures::new(&segmented, store.root(), options)?.par_compute(config.workers)?;
    report.rows = table.len();
    table.save_csv(config.features_path())?;
    report.outputs.push(config.features_path());
    report.stage("features", t.elapsed());

    Ok(report)
}

//! 写出图块. 这是外部分割网络依赖的输入格式.

use super::codec::{check_layout, ImgWriteRaw};
use super::{StoreError, StoreResult, TileStore};
use crate::consts::layout::IMAGES_DIR;
use crate::data::ToStaged;
use crate::grid::Partition;
use ndarray::Dimension;
use std::fs;
use std::path::{Path, PathBuf};

/// 分级布局的图块写出器.
///
/// 默认拒绝写入非空目录; 开启 [`TileWriter::force`] 后会先清空目标目录.
#[derive(Clone, Debug)]
pub struct TileWriter {
    root: PathBuf,
    force: bool,
}

impl TileWriter {
    /// 以 `root` 为目标目录创建写出器. 目录不存在时会在写出时创建.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_owned(),
            force: false,
        }
    }

    /// 是否允许覆写非空目录.
    #[inline]
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// 写出 `partition` 的全部图块到 `{root}/{name}/images/{name}.png`.
    ///
    /// 所有检查 (目标目录是否非空, 每块形状是否可编码) 都在写出第一个文件之前完成.
    /// 成功时返回对应的分级布局 [`TileStore`].
    pub fn write<A, D>(&self, partition: &Partition<A, D>) -> StoreResult<TileStore>
    where
        A: ToStaged,
        D: Dimension,
    {
        for tile in partition.tiles() {
            check_layout(tile.data.shape())?;
        }
        self.prepare()?;

        let store = TileStore::staged(&self.root);
        for tile in partition.tiles() {
            let path = store.staged_path(&tile.name);
            fs::create_dir_all(self.root.join(tile.name.to_string()).join(IMAGES_DIR))?;
            A::to_staged(tile.data.view()).save_raw(&path)?;
            log::debug!("Wrote {}", path.display());
        }
        log::info!(
            "Staged {} tiles into {}",
            partition.len(),
            self.root.display()
        );
        Ok(store)
    }

    /// 准备目标目录: 不存在则创建; 非空时按 `force` 清空或报错.
    fn prepare(&self) -> StoreResult<()> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root)?;
            return Ok(());
        }
        let non_empty = fs::read_dir(&self.root)?.next().is_some();
        if non_empty {
            if !self.force {
                return Err(StoreError::NotEmpty(self.root.clone()));
            }
            log::warn!("Clearing {}", self.root.display());
            fs::remove_dir_all(&self.root)?;
            fs::create_dir_all(&self.root)?;
        }
        Ok(())
    }
}

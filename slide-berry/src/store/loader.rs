//! 图块加载器.
//!
//! 提供迭代器风格的图块获取模式. 文件在迭代时才被读取.

use super::codec::{read_color, read_label};
use super::{StoreResult, TileEntry, TileStore};
use crate::data::{ColorTile, LabelTile};
use crate::grid::TileName;
use std::path::Path;

/// 单个文件的读取函数.
pub type TileReader<T> = fn(&Path) -> StoreResult<T>;

/// 按网格坐标升序 (先 `x` 后 `y`) 迭代目录中的图块.
pub struct TileLoader<T> {
    entries_rev: Vec<TileEntry>,
    reader: TileReader<T>,
}

impl<T> TileLoader<T> {
    /// 从已列出的条目和读取函数创建加载器.
    pub fn new(mut entries: Vec<TileEntry>, reader: TileReader<T>) -> Self {
        entries.reverse();
        Self {
            entries_rev: entries,
            reader,
        }
    }
}

impl<T> Iterator for TileLoader<T> {
    type Item = (TileName, StoreResult<T>);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries_rev.pop()?;
        let data = (self.reader)(&entry.path);
        Some((entry.name, data))
    }
}

impl<T> ExactSizeIterator for TileLoader<T> {
    #[inline]
    fn len(&self) -> usize {
        self.entries_rev.len()
    }
}

/// 创建 8-bit 彩色 (或灰度) 图块的加载器.
///
/// 列出目录失败时 (空目录、非法块名等) 立即返回 `Err`.
pub fn color_loader(store: &TileStore) -> StoreResult<TileLoader<ColorTile>> {
    Ok(TileLoader::new(store.entries()?, |p| read_color(p)))
}

/// 创建实例标签掩码的加载器.
///
/// 列出目录失败时 (空目录、非法块名等) 立即返回 `Err`.
pub fn label_loader(store: &TileStore) -> StoreResult<TileLoader<LabelTile>> {
    Ok(TileLoader::new(store.entries()?, |p| read_label(p)))
}

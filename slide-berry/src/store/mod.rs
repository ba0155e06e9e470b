//! 图块存储: 网格坐标与磁盘上图块文件之间的映射.
//!
//! 支持两种布局:
//!
//! 1. 分级布局 [`Layout::Staged`]: `{root}/{name}/images/{name}.png`,
//!   即 [`TileWriter`] 的写出格式, 也是外部分割网络约定的输入格式.
//! 2. 扁平布局 [`Layout::Flat`]: `{root}/{name}.{ext}`, 即外部分割网络的输出格式.
//!
//! 块名是网格坐标在往返过程中唯一的载体, 见 [`crate::grid::TileName`].

mod codec;
mod error;
mod loader;
mod write;

pub use codec::{read_color, read_label, read_rgb, ImgWriteRaw, LabelWrite};
pub use error::StoreError;
pub use loader::{color_loader, label_loader, TileLoader};
pub use write::TileWriter;

use crate::consts::layout::{IMAGES_DIR, KNOWN_EXTS, TILE_EXT};
use crate::grid::{GridPos, TileName};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// 图块存储运行时错误.
pub type StoreResult<T> = Result<T, StoreError>;

/// 图块目录布局.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Layout {
    /// `{root}/{name}/images/{name}.png`.
    Staged,

    /// `{root}/{name}.{ext}`.
    Flat,
}

/// 目录中的一个图块条目.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileEntry {
    /// 块名.
    pub name: TileName,

    /// 图块文件路径.
    pub path: PathBuf,
}

/// 一个以某种布局组织的图块目录.
#[derive(Clone, Debug)]
pub struct TileStore {
    root: PathBuf,
    layout: Layout,
}

impl TileStore {
    /// 分级布局的图块目录.
    #[inline]
    pub fn staged<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_owned(),
            layout: Layout::Staged,
        }
    }

    /// 扁平布局的图块目录.
    #[inline]
    pub fn flat<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_owned(),
            layout: Layout::Flat,
        }
    }

    /// 根目录.
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 布局.
    #[inline]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// 分级布局下块名 `name` 的约定路径 `{root}/{name}/images/{name}.png`.
    pub fn staged_path(&self, name: &TileName) -> PathBuf {
        let name = name.to_string();
        let mut p = self.root.join(&name);
        p.push(IMAGES_DIR);
        p.push(format!("{name}.{TILE_EXT}"));
        p
    }

    /// 查找块名 `name` 对应的已存在图块文件.
    ///
    /// 扁平布局下依次尝试 [`KNOWN_EXTS`] 中的扩展名.
    pub fn find(&self, name: &TileName) -> Option<PathBuf> {
        match self.layout {
            Layout::Staged => Some(self.staged_path(name)).filter(|p| p.is_file()),
            Layout::Flat => KNOWN_EXTS
                .iter()
                .map(|ext| self.root.join(format!("{name}.{ext}")))
                .find(|p| p.is_file()),
        }
    }

    /// 列出目录中所有图块, 按网格坐标 (先 `x` 后 `y`) 升序排列.
    ///
    /// 隐藏条目 (以 `.` 开头) 被忽略. 以下情况返回 `Err`:
    ///
    /// 1. 目录不存在或不可读;
    /// 2. 条目名无法解析为块名;
    /// 3. 分级布局下图块目录缺少约定路径的图像;
    /// 4. 同一网格坐标出现两次;
    /// 5. 目录中没有任何图块.
    pub fn entries(&self) -> StoreResult<Vec<TileEntry>> {
        let mut entries = Vec::new();
        for dir_entry in fs::read_dir(&self.root)? {
            let path = dir_entry?.path();
            let hidden = path
                .file_name()
                .and_then(|s| s.to_str())
                .map_or(true, |s| s.starts_with('.'));
            if hidden {
                continue;
            }

            let entry = match self.layout {
                Layout::Staged if path.is_dir() => {
                    let name = TileName::from_dir(&path)?;
                    let artifact = self.staged_path(&name);
                    if !artifact.is_file() {
                        return Err(StoreError::MissingArtifact(artifact));
                    }
                    TileEntry {
                        name,
                        path: artifact,
                    }
                }
                Layout::Flat if path.is_file() => TileEntry {
                    name: TileName::from_file(&path)?,
                    path,
                },
                _ => {
                    log::debug!("Skipping {}", path.display());
                    continue;
                }
            };
            entries.push(entry);
        }

        if entries.is_empty() {
            return Err(StoreError::Empty(self.root.clone()));
        }

        entries.sort_by_key(|e| e.name.pos());
        let mut seen: HashSet<GridPos> = HashSet::with_capacity(entries.len());
        for e in entries.iter() {
            if !seen.insert(e.name.pos()) {
                return Err(StoreError::Duplicate(e.name.pos()));
            }
        }
        Ok(entries)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::scratch_dir;
    use super::*;
    use ndarray::Array2;
    use std::fs;

    fn touch_png(path: &Path) {
        Array2::<u8>::zeros((2, 2)).save_raw(path).unwrap();
    }

    #[test]
    fn test_flat_entries_sorted() {
        let dir = scratch_dir("store-flat");
        for name in ["a_b_1_0", "a_b_0_1", "a_b_0_0", "a_b_1_1"] {
            touch_png(&dir.join(format!("{name}.png")));
        }
        fs::write(dir.join(".hidden"), b"x").unwrap();

        let store = TileStore::flat(&dir);
        let got: Vec<GridPos> = store
            .entries()
            .unwrap()
            .iter()
            .map(|e| e.name.pos())
            .collect();
        assert_eq!(
            got,
            [(0, 0), (0, 1), (1, 0), (1, 1)].map(|(x, y)| GridPos::new(x, y))
        );
        assert!(store.entries().unwrap()[0].name.base() == "a_b");
    }

    #[test]
    fn test_empty_store() {
        let dir = scratch_dir("store-empty");
        assert!(matches!(
            TileStore::flat(&dir).entries(),
            Err(StoreError::Empty(_))
        ));
    }

    #[test]
    fn test_duplicate_and_invalid() {
        let dir = scratch_dir("store-dup");
        touch_png(&dir.join("img_0_0.png"));
        touch_png(&dir.join("img_0_0.tif"));
        assert!(matches!(
            TileStore::flat(&dir).entries(),
            Err(StoreError::Duplicate(_))
        ));

        let dir = scratch_dir("store-invalid");
        touch_png(&dir.join("notes.png"));
        assert!(matches!(
            TileStore::flat(&dir).entries(),
            Err(StoreError::InvalidName(_))
        ));
    }

    #[test]
    fn test_staged_missing_artifact() {
        let dir = scratch_dir("store-staged");
        fs::create_dir_all(dir.join("img_0_0").join(IMAGES_DIR)).unwrap();
        assert!(matches!(
            TileStore::staged(&dir).entries(),
            Err(StoreError::MissingArtifact(_))
        ));
    }

    #[test]
    fn test_find() {
        let dir = scratch_dir("store-find");
        touch_png(&dir.join("img_2_3.tif"));
        let store = TileStore::flat(&dir);
        let name = TileName::new("img", GridPos::new(2, 3));
        assert_eq!(store.find(&name), Some(dir.join("img_2_3.tif")));
        assert_eq!(store.find(&TileName::new("img", GridPos::new(0, 0))), None);
    }
}

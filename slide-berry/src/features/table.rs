//! 特征表: 列名加上一个 `f64` 行矩阵.

use super::{ExtractError, ExtractResult};
use crate::store::StoreError;
use itertools::Itertools;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use ndarray_npy::write_npy;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 特征表. 每行对应一个细胞核实例.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FeatureTable {
    columns: Vec<String>,
    data: Array2<f64>,
}

impl FeatureTable {
    /// 由列名和按行展平的数据构造. 数据长度必须是列数的整数倍.
    pub fn from_flat<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        flat: Vec<f64>,
    ) -> ExtractResult<Self> {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let width = columns.len();
        let rows = if width == 0 { 0 } else { flat.len() / width };
        let data = Array2::from_shape_vec((rows, width), flat)?;
        Ok(Self { columns, data })
    }

    /// 列名.
    #[inline]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// 行矩阵, 形状 `(行数, 列数)`.
    #[inline]
    pub fn data(&self) -> ArrayView2<f64> {
        self.data.view()
    }

    /// 行数.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    /// 是否没有任何行?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 第 `i` 行.
    #[inline]
    pub fn row(&self, i: usize) -> ArrayView1<f64> {
        self.data.row(i)
    }

    /// 名为 `name` 的列. 不存在时返回 `None`.
    pub fn column(&self, name: &str) -> Option<ArrayView1<f64>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.data.index_axis(Axis(1), idx))
    }

    /// 以 CSV 格式写出, 首行为列名.
    pub fn write_csv<W: Write>(&self, mut w: W) -> io::Result<()> {
        writeln!(w, "{}", self.columns.iter().join(","))?;
        for row in self.data.rows() {
            writeln!(w, "{}", row.iter().join(","))?;
        }
        w.flush()
    }

    /// 以 CSV 格式保存到 `path`.
    pub fn save_csv<P: AsRef<Path>>(&self, path: P) -> ExtractResult<()> {
        let w = BufWriter::new(File::create(path.as_ref())?);
        self.write_csv(w)?;
        log::info!("Saved {} rows to {}", self.len(), path.as_ref().display());
        Ok(())
    }

    /// 以 `.npy` 格式保存行矩阵 (不含列名).
    pub fn save_npy<P: AsRef<Path>>(&self, path: P) -> ExtractResult<()> {
        write_npy(path.as_ref(), &self.data)
            .map_err(|e| ExtractError::Store(StoreError::from(e)))?;
        log::info!("Saved {} rows to {}", self.len(), path.as_ref().display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::scratch_dir;
    use ndarray::{array, Array2};
    use ndarray_npy::read_npy;

    fn table() -> FeatureTable {
        FeatureTable::from_flat(["x", "y", "size"], vec![1.5, 2.0, 3.0, 4.0, 5.25, 6.0]).unwrap()
    }

    #[test]
    fn test_shape_and_columns() {
        let t = table();
        assert_eq!(t.len(), 2);
        assert_eq!(t.column("y").unwrap(), array![2.0, 5.25]);
        assert!(t.column("z").is_none());
        assert_eq!(t.row(1), array![4.0, 5.25, 6.0]);

        assert!(matches!(
            FeatureTable::from_flat(["a", "b"], vec![1.0, 2.0, 3.0]),
            Err(ExtractError::Shape(_))
        ));
    }

    #[test]
    fn test_csv() {
        let mut buf = Vec::new();
        table().write_csv(&mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "x,y,size\n1.5,2,3\n4,5.25,6\n");

        let empty = FeatureTable::from_flat(["size"], vec![]).unwrap();
        let mut buf = Vec::new();
        empty.write_csv(&mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "size\n");
    }

    #[test]
    fn test_save_npy() {
        let dir = scratch_dir("table-npy");
        let path = dir.join("features.npy");
        table().save_npy(&path).unwrap();
        let back: Array2<f64> = read_npy(&path).unwrap();
        assert_eq!(back, table().data());
    }
}

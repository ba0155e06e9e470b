#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 将全切片显微扫描图像 (whole-slide image) 切分为网格图块以供外部实例分割网络推理,
//! 随后把逐块预测的实例标签拼接回一张全局标签图, 并在原图坐标系下提取每个细胞核实例的形态与颜色特征.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 分割网络本身不在本 crate 内. 它被视作外部批处理进程:
//!   输入为 [`store::TileWriter`] 写出的图块目录, 输出为同名的逐块标签掩码目录.
//! 2. 配置错误、目录布局错误 (缺块、非空目标目录等) 均以 `Err` 返回, 不会 panic.
//!   单个实例的几何退化 (椭圆拟合失败) 在本地被吸收为全零特征.
//!
//! # 开发计划
//!
//! ### 网格切分 ✅
//!
//! 按块数或块尺寸切分图像, 相邻块尺寸最多相差一个像素. 块名形如 `{base}_{x}_{y}`.
//!
//! 实现位于 `slide-berry/src/grid`.
//!
//! ### 图块存储 ✅
//!
//! 1. 写出: `{root}/{name}/images/{name}.png`, 即外部网络约定的输入格式. ✅
//! 2. 读取: 该 "分级" 布局, 以及网络输出的 "扁平" 布局 `{dir}/{name}.{ext}`. ✅
//! 3. 8/16-bit PNG/TIFF 与 `.npy` 标签掩码. ✅
//!
//! 实现位于 `slide-berry/src/store`.
//!
//! ### 拼接与实例标签重编号 ✅
//!
//! 普通模式按行拼接后纵向堆叠; 标签合并模式下按行优先序为每块累加偏移,
//! 保证全局实例编号唯一. 并行版本以 "逐块最大值 + 排他前缀和" 实现, 结果与顺序版本完全一致.
//!
//! 实现位于 `slide-berry/src/mosaic`.
//!
//! ### 细胞核特征提取 ✅
//!
//! 位置、面积、椭圆、颜色 (RGB 与灰度) 五类特征, 以及稀疏索引加速路径和按块并行入口.
//!
//! 实现位于 `slide-berry/src/features`.
//!
//! ### 外轮廓追踪与椭圆拟合 ✅
//!
//! 8-邻域 Moore 追踪 + 二次曲线最小二乘拟合.
//!
//! 实现位于 `slide-berry/src/eight` 与 `slide-berry/src/fitting`.
//!
//! ### 坐标约定
//!
//! 内存中的图像一律以 `(h, w[, c])` 存储, 即 `(行, 列[, 通道])`.
//! 网格坐标 `x` 对应列 (宽) 方向, `y` 对应行 (高) 方向.
//! 特征提取前的方向归一化会交换两个空间轴, 因此特征中的 `(x, y)` 与网格坐标同向.

/// 二维索引 `(h, w)`, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

pub mod consts;

pub mod data;

pub mod eight;

pub mod fitting;

pub mod grid;

pub mod store;

pub mod mosaic;

pub mod features;

pub mod prelude;

pub use grid::{split_image, GridLayout, GridPos, GridSpec, Partition, Tile, TileName};

pub use store::{Layout, TileStore, TileWriter};

pub use features::{FeatureKind, FeatureTable, NucleiFeatures};

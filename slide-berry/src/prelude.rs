//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::Idx2d;

pub use crate::grid::{split_image, GridLayout, GridPos, GridSpec, Partition, Tile, TileName};

pub use crate::store::{
    color_loader, label_loader, ImgWriteRaw, LabelWrite, Layout, TileStore, TileWriter,
};

pub use crate::mosaic::{restore_image, restore_labels, restore_labels_with, LabelMode};

#[cfg(feature = "rayon")]
pub use crate::mosaic::{par_restore_labels, par_restore_labels_with};

pub use crate::features::{
    ExtractorOptions, FeatureKind, FeatureTable, InstanceBound, NucleiFeatures, Strategy,
};

pub use crate::consts::label::{is_background, is_instance, BACKGROUND};

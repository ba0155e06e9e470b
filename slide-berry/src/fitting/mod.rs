//! 曲线拟合.
//!
//! 给定一系列点 `(x, y)`, 该模块可以拟合出一个椭圆.

mod ellipse;

pub use ellipse::{fit_ellipse, Ellipse};

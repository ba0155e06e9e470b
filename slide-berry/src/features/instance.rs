//! 单个细胞核实例的特征计算.

use super::FeatureKind;
use crate::consts::ellipse::{AXIS_FALLBACK, AXIS_LIMIT};
use crate::consts::LUMA;
use crate::data::ColorView;
use crate::eight::trace_external;
use crate::fitting::fit_ellipse;
use crate::Idx2d;
use ndarray::{s, Array2, ArrayView1, ArrayView2, Axis};

/// 一个实例: 其二值掩码, 以及掩码下的原图像素.
///
/// 掩码可以是整张图块大小, 也可以只覆盖实例的外接矩形. `origin`
/// 为掩码左上角在 (方向归一化后的) 图块中的位置, 两种情况下计算结果完全相同.
pub(crate) struct Instance<'a> {
    mask: Array2<bool>,
    original: ColorView<'a>,
    origin: Idx2d,
    count: usize,
}

/// 图块在全局坐标系中的平移量 `(x, y)`.
pub(crate) type Offset = (f64, f64);

impl<'a> Instance<'a> {
    /// `original` 的空间形状必须与 `mask` 一致.
    pub(crate) fn new(mask: Array2<bool>, original: ColorView<'a>, origin: Idx2d) -> Self {
        debug_assert_eq!(mask.dim(), (original.shape()[0], original.shape()[1]));
        let count = mask.iter().filter(|&&m| m).count();
        Self {
            mask,
            original,
            origin,
            count,
        }
    }

    /// 像素个数.
    #[inline]
    pub(crate) fn count(&self) -> usize {
        self.count
    }

    #[inline]
    fn mask(&self) -> ArrayView2<bool> {
        self.mask.view()
    }

    /// 掩码下的原图像素, 按光栅序.
    fn pixels(&self) -> impl Iterator<Item = ArrayView1<'a, u8>> + '_ {
        let original = self.original;
        self.mask
            .indexed_iter()
            .filter(|(_, &m)| m)
            .map(move |((h, w), _)| original.slice_move(s![h, w, ..]))
    }

    /// 在 `out` 末尾追加特征 `kind` 的各列.
    pub(crate) fn push_features(&self, kind: FeatureKind, offset: Offset, out: &mut Vec<f64>) {
        match kind {
            FeatureKind::Position => {
                let (x, y) = self.centroid();
                out.extend([x + offset.0, y + offset.1]);
            }
            FeatureKind::Size => out.push(self.count as f64),
            FeatureKind::Ellipse => out.extend(self.ellipse(offset)),
            FeatureKind::Color => out.extend(self.color()),
            FeatureKind::ColorGray => out.extend(self.color_gray()),
        }
    }

    /// 质心 `(x, y)`. 方向归一化后第 0 轴即 `x`.
    fn centroid(&self) -> (f64, f64) {
        let (sx, sy) = self
            .mask
            .indexed_iter()
            .filter(|(_, &m)| m)
            .fold((0usize, 0usize), |(sx, sy), ((h, w), _)| (sx + h, sy + w));
        let n = self.count;
        // 先换算为整张图块上的坐标和, 结果与掩码大小无关.
        let sx = sx + self.origin.0 * n;
        let sy = sy + self.origin.1 * n;
        (sx as f64 / n as f64, sy as f64 / n as f64)
    }

    /// `[first_axis, second_axis, ellipse_x, ellipse_y, ellipse_angle]`. 拟合失败时全为 0.
    fn ellipse(&self, offset: Offset) -> [f64; 5] {
        let points: Vec<(f64, f64)> = trace_external(self.mask())
            .into_iter()
            .map(|(h, w)| ((h + self.origin.0) as f64, (w + self.origin.1) as f64))
            .collect();
        let e = match fit_ellipse(&points) {
            Some(e) => e,
            None => {
                log::trace!("Degenerate ellipse with {} contour points", points.len());
                return [0.0; 5];
            }
        };
        let (first, second) = if e.axes.1 > AXIS_LIMIT {
            (AXIS_FALLBACK, AXIS_FALLBACK)
        } else {
            e.axes
        };
        [
            first,
            second,
            e.center.0 + offset.0,
            e.center.1 + offset.1,
            e.angle,
        ]
    }

    /// 对每个像素取 `f` 的值, 求均值与总体标准差.
    fn mean_std<F: Fn(ArrayView1<u8>) -> f64>(&self, f: F) -> (f64, f64) {
        let n = self.count as f64;
        let mean = self.pixels().map(&f).sum::<f64>() / n;
        let var = self.pixels().map(|p| (f(p) - mean).powi(2)).sum::<f64>() / n;
        (mean, var.sqrt())
    }

    /// `[red_mean, green_mean, blue_mean, red_std, green_std, blue_std]`.
    fn color(&self) -> [f64; 6] {
        let mut out = [0.0; 6];
        let channels = self.original.len_of(Axis(2)).min(3);
        for c in 0..channels {
            let (mean, std) = self.mean_std(|p| p[c] as f64);
            out[c] = mean;
            out[c + 3] = std;
        }
        out
    }

    /// `[gray_mean, gray_std]`.
    fn color_gray(&self) -> [f64; 2] {
        let (mean, std) = self.mean_std(|p| {
            if p.len() < 3 {
                p[0] as f64
            } else {
                LUMA.iter().zip(p.iter()).map(|(k, &v)| k * v as f64).sum()
            }
        });
        [mean, std]
    }
}

//! 椭圆拟合.

// 直接最小二乘: 将中心化、归一化后的点代入二次曲线
// A x^2 + B xy + C y^2 + D x + E y = 1, 解正规方程.

use crate::consts::ellipse::MIN_POINTS;
use faer::linalg::solvers::Solve;
use faer::Mat;
use ndarray::{Array1, Array2};

/// 正规方程解的相对残差上限. 超过它视为方程组奇异.
const RESIDUAL_EPS: f64 = 1e-8;

/// 一个椭圆.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Ellipse {
    /// 中心 `(x, y)`.
    pub center: (f64, f64),

    /// 两轴的全长 `(短轴, 长轴)`.
    pub axes: (f64, f64),

    /// 第一条轴 (短轴) 相对 `x` 轴的倾角 (度), 范围 `[0, 180)`.
    ///
    /// 与 OpenCV `fitEllipse` 的约定一致: 角度描述的是 `axes.0` 的方向,
    /// 长轴方向为 `angle + 90`.
    pub angle: f64,
}

/// 对点集拟合椭圆.
///
/// 以下情况返回 `None`: 少于 5 个点, 点集退化 (如共线),
/// 拟合出的二次曲线不是椭圆.
pub fn fit_ellipse(points: &[(f64, f64)]) -> Option<Ellipse> {
    if points.len() < MIN_POINTS {
        return None;
    }
    let n = points.len() as f64;
    let (mx, my) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x, sy + y));
    let (mx, my) = (mx / n, my / n);
    let rms = (points
        .iter()
        .map(|&(x, y)| (x - mx).powi(2) + (y - my).powi(2))
        .sum::<f64>()
        / n)
        .sqrt();
    if !(rms > 0.0) {
        return None;
    }

    let mut design = Array2::<f64>::zeros((points.len(), 5));
    for (mut row, &(x, y)) in design.rows_mut().into_iter().zip(points.iter()) {
        let (u, v) = ((x - mx) / rms, (y - my) / rms);
        row.assign(&ndarray::arr1(&[u * u, u * v, v * v, u, v]));
    }
    let ones = Array1::<f64>::ones(points.len());
    let normal = design.t().dot(&design);
    let rhs = design.t().dot(&ones);
    let coef = solve_normal(&normal, &rhs)?;

    let (mut a, mut b, mut c, d, e) = (coef[0], coef[1], coef[2], coef[3], coef[4]);
    let det = 4.0 * a * c - b * b;
    if !(det > 0.0) {
        return None;
    }

    let u0 = (b * e - 2.0 * c * d) / det;
    let v0 = (b * d - 2.0 * a * e) / det;
    let mut f0 = a * u0 * u0 + b * u0 * v0 + c * v0 * v0 + d * u0 + e * v0 - 1.0;

    // 二次型正定.
    if a + c < 0.0 {
        (a, b, c, f0) = (-a, -b, -c, -f0);
    }
    if !(f0 < 0.0) {
        return None;
    }

    let mid = (a + c) / 2.0;
    let radius = (((a - c) / 2.0).powi(2) + (b / 2.0).powi(2)).sqrt();
    let (l_min, l_max) = (mid - radius, mid + radius);
    if !(l_min > 0.0) {
        return None;
    }
    let semi_major = (-f0 / l_min).sqrt();
    let semi_minor = (-f0 / l_max).sqrt();

    // 二次型取最大值的方向是短轴方向.
    let minor_dir = 0.5 * b.atan2(a - c);
    let angle = minor_dir.to_degrees().rem_euclid(180.0);

    let ellipse = Ellipse {
        center: (mx + u0 * rms, my + v0 * rms),
        axes: (2.0 * semi_minor * rms, 2.0 * semi_major * rms),
        angle: if angle >= 180.0 { 0.0 } else { angle },
    };
    let finite = [
        ellipse.center.0,
        ellipse.center.1,
        ellipse.axes.0,
        ellipse.axes.1,
        ellipse.angle,
    ]
    .iter()
    .all(|v| v.is_finite());
    finite.then_some(ellipse)
}

/// 以列主元 LU 分解求解 `normal x = rhs`. 方程组奇异时返回 `None`.
fn solve_normal(normal: &Array2<f64>, rhs: &Array1<f64>) -> Option<Array1<f64>> {
    let n = rhs.len();
    let a = Mat::<f64>::from_fn(n, n, |i, j| normal[(i, j)]);
    let b = Mat::<f64>::from_fn(n, 1, |i, _| rhs[i]);
    let x: Mat<f64> = a.partial_piv_lu().solve(&b);
    let x = Array1::from_shape_fn(n, |i| x[(i, 0)]);
    if !x.iter().all(|v| v.is_finite()) {
        return None;
    }

    let scale = rhs.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let residual = (normal.dot(&x) - rhs)
        .iter()
        .fold(0.0_f64, |m, v| m.max(v.abs()));
    (residual <= RESIDUAL_EPS * scale.max(1.0)).then_some(x)
}

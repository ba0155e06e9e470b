//! 特征种类.

use super::ExtractError;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 可提取的细胞核特征. 输出列为各特征子列按请求顺序的拼接.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum FeatureKind {
    /// 质心, 已平移至全局坐标.
    Position,

    /// 像素个数.
    Size,

    /// 外轮廓的拟合椭圆.
    ///
    /// `first_axis <= second_axis` 为两轴全长. `ellipse_angle` 是 `first_axis`
    /// (短轴) 相对 `x` 轴的倾角, 单位为度, 范围 `[0, 180)`, 与 OpenCV `fitEllipse`
    /// 的约定相同. 长轴大于 100 时两轴均记为 30; 拟合失败时五列均为 0.
    Ellipse,

    /// RGB 各通道的均值与总体标准差.
    Color,

    /// 亮度的均值与总体标准差.
    ColorGray,
}

impl FeatureKind {
    /// 全部特征, 即 `all` 选中的特征.
    pub const ALL: [FeatureKind; 5] = [
        Self::Position,
        Self::Size,
        Self::Ellipse,
        Self::Color,
        Self::ColorGray,
    ];

    /// 特征名.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::Size => "size",
            Self::Ellipse => "ellipse",
            Self::Color => "color",
            Self::ColorGray => "color_gray",
        }
    }

    /// 该特征的输出列名.
    pub const fn columns(self) -> &'static [&'static str] {
        match self {
            Self::Position => &["x", "y"],
            Self::Size => &["size"],
            Self::Ellipse => &[
                "first_axis",
                "second_axis",
                "ellipse_x",
                "ellipse_y",
                "ellipse_angle",
            ],
            Self::Color => &[
                "red_mean",
                "green_mean",
                "blue_mean",
                "red_std",
                "green_std",
                "blue_std",
            ],
            Self::ColorGray => &["gray_mean", "gray_std"],
        }
    }

    /// 输出列数.
    #[inline]
    pub const fn width(self) -> usize {
        self.columns().len()
    }

    /// 解析以逗号分隔的特征列表. `all` 展开为 [`FeatureKind::ALL`], 重复项保留.
    ///
    /// ```
    /// use slide_berry::FeatureKind;
    ///
    /// let kinds = FeatureKind::parse_list("size, color").unwrap();
    /// assert_eq!(kinds, [FeatureKind::Size, FeatureKind::Color]);
    /// assert_eq!(FeatureKind::parse_list("all").unwrap().len(), 5);
    /// ```
    pub fn parse_list(s: &str) -> Result<Vec<FeatureKind>, ExtractError> {
        let mut kinds = Vec::new();
        for item in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            if item.eq_ignore_ascii_case("all") {
                kinds.extend(Self::ALL);
            } else {
                kinds.push(item.parse()?);
            }
        }
        if kinds.is_empty() {
            return Err(ExtractError::NoFeatures);
        }
        Ok(kinds)
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FeatureKind {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ExtractError::UnknownFeature(s.to_owned()))
    }
}

/// 一组特征的全部列名.
pub fn column_names(kinds: &[FeatureKind]) -> Vec<&'static str> {
    kinds.iter().flat_map(|k| k.columns().iter().copied()).collect()
}

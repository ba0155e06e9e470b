//! 块名编码. 块名是网格坐标在存储往返中唯一的载体, 因此必须无歧义且可无损解析.

use super::GridPos;
use crate::consts::layout::NAME_SEP;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 块名 `{base}_{x}_{y}`.
///
/// 解析时从右侧按 `_` 切分, 取最后两段作为 `x`, `y`, 因此 `base` 本身可以包含 `_`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TileName {
    base: String,
    pos: GridPos,
}

/// 块名解析错误. 携带无法解析的原始字符串.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseNameError(pub String);

impl fmt::Display for ParseNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` 不是形如 `{{base}}_{{x}}_{{y}}` 的块名", self.0)
    }
}

impl std::error::Error for ParseNameError {}

impl TileName {
    /// 直接构造.
    #[inline]
    pub fn new(base: impl Into<String>, pos: GridPos) -> Self {
        Self {
            base: base.into(),
            pos,
        }
    }

    /// 块名前缀.
    #[inline]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// 网格坐标.
    #[inline]
    pub fn pos(&self) -> GridPos {
        self.pos
    }

    /// 从文件路径解析块名. 文件会先去掉 (最后一个) 扩展名.
    pub fn from_file(path: &Path) -> Result<Self, ParseNameError> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ParseNameError(path.display().to_string()))?;
        stem.parse()
    }

    /// 从目录路径解析块名. 与 [`TileName::from_file`] 不同, 目录名不剥离扩展名.
    pub fn from_dir(path: &Path) -> Result<Self, ParseNameError> {
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ParseNameError(path.display().to_string()))?;
        name.parse()
    }
}

impl FromStr for TileName {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseNameError(s.to_string());
        let mut parts = s.rsplitn(3, NAME_SEP);
        let y = parts.next().ok_or_else(err)?;
        let x = parts.next().ok_or_else(err)?;
        // "0_1" 这种没有前缀的块名也是合法的.
        let base = parts.next().unwrap_or_default();

        let parse = |v: &str| -> Result<usize, ParseNameError> {
            if v.is_empty() || !v.bytes().all(|b| b.is_ascii_digit()) {
                return Err(err());
            }
            v.parse().map_err(|_| err())
        };

        Ok(Self {
            base: base.to_string(),
            pos: GridPos::new(parse(x)?, parse(y)?),
        })
    }
}

impl fmt::Display for TileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{NAME_SEP}{}{NAME_SEP}{}",
            self.base, self.pos.x, self.pos.y
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let name = TileName::new("img", GridPos::new(3, 12));
        assert_eq!(name.to_string(), "img_3_12");
        assert_eq!("img_3_12".parse::<TileName>().unwrap(), name);
    }

    #[test]
    fn test_base_with_underscores() {
        let name: TileName = "slide_2024_scan_7_0".parse().unwrap();
        assert_eq!(name.base(), "slide_2024_scan");
        assert_eq!(name.pos(), GridPos::new(7, 0));
    }

    #[test]
    fn test_no_base() {
        let name: TileName = "4_5".parse().unwrap();
        assert_eq!(name.base(), "");
        assert_eq!(name.pos(), GridPos::new(4, 5));
    }

    #[test]
    fn test_from_file_strips_extension() {
        let name = TileName::from_file(Path::new("/tmp/pred/img_1_0.tif")).unwrap();
        assert_eq!(name.pos(), GridPos::new(1, 0));

        // 目录名中的 `.` 不是扩展名.
        let name = TileName::from_dir(Path::new("/tmp/stage/v1.2_0_1")).unwrap();
        assert_eq!(name.base(), "v1.2");
    }

    #[test]
    fn test_invalid() {
        for bad in ["img", "img_1", "img_a_1", "img_1_-2", "img_1_", "img__1"] {
            assert!(bad.parse::<TileName>().is_err(), "{bad}");
        }
    }
}

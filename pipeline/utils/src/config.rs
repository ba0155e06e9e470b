//! 从环境变量读取流水线配置.
//!
//! 每个路径都有一个环境变量; 变量为空或未设置时, 回退到 `$HOME/slides/` 下的约定位置.

use std::env;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// 全切片图像路径.
pub const IMAGE_VAR: &str = "SLIDE_IMAGE";

/// 图块写出目录.
pub const SAMPLE_DIR_VAR: &str = "SLIDE_SAMPLE_DIR";

/// 外部分割网络的工作目录.
pub const NETWORK_DIR_VAR: &str = "SLIDE_NETWORK_DIR";

/// 块尺寸 (像素).
pub const TILE_SIZE_VAR: &str = "SLIDE_TILE_SIZE";

/// 特征提取的线程数.
pub const WORKERS_VAR: &str = "SLIDE_WORKERS";

/// 以逗号分隔的特征名.
pub const FEATURES_VAR: &str = "SLIDE_FEATURES";

/// 为 `0` 或 `false` 时拒绝覆写已有输出.
pub const FORCE_VAR: &str = "SLIDE_FORCE";

/// 默认块尺寸.
pub const DEFAULT_TILE_SIZE: usize = 1000;

/// 读取配置时的错误.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// 无法确定用户主目录, 且对应环境变量未设置.
    NoHome(&'static str),

    /// 环境变量的值无法解析. 依次为变量名和值.
    Invalid(&'static str, String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoHome(var) => write!(f, "`${var}` 未设置, 且无法确定用户主目录"),
            Self::Invalid(var, v) => write!(f, "无法解析 `${var}` 的值 `{v}`"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// 返回 `$HOME/slides/{it...}`.
pub fn home_slide_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("slides");
    ans.extend(it);
    Some(ans)
}

/// 非空环境变量的值.
fn non_empty(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn path_from_env_or_home(var: &'static str, fallback: &str) -> Result<PathBuf, ConfigError> {
    match non_empty(var) {
        Some(v) => Ok(PathBuf::from(v)),
        None => home_slide_dir_with([fallback]).ok_or(ConfigError::NoHome(var)),
    }
}

fn parse_positive(var: &'static str, default: usize) -> Result<NonZeroUsize, ConfigError> {
    let fallback = NonZeroUsize::new(default).unwrap_or(NonZeroUsize::MIN);
    match non_empty(var) {
        None => Ok(fallback),
        Some(v) => v
            .trim()
            .parse::<NonZeroUsize>()
            .map_err(|_| ConfigError::Invalid(var, v)),
    }
}

fn parse_flag(var: &'static str, default: bool) -> Result<bool, ConfigError> {
    match non_empty(var) {
        None => Ok(default),
        Some(v) => match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(ConfigError::Invalid(var, v)),
        },
    }
}

/// 一次分割流水线的配置.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentConfig {
    /// 全切片图像.
    pub image: PathBuf,

    /// 图块写出目录.
    pub sample_dir: PathBuf,

    /// 外部分割网络的工作目录, 内含 `predict_test.sh`.
    pub network_dir: PathBuf,

    /// 块尺寸 (两个方向相同).
    pub tile_size: NonZeroUsize,

    /// 特征提取的线程数.
    pub workers: NonZeroUsize,

    /// 以逗号分隔的特征名, `all` 表示全部.
    pub features: String,

    /// 是否覆写已有输出.
    pub force: bool,
}

impl SegmentConfig {
    /// 从环境变量读取配置.
    ///
    /// 1. `$SLIDE_IMAGE`, 否则 `$HOME/slides/test_img.jpg`;
    /// 2. `$SLIDE_SAMPLE_DIR`, 否则 `$HOME/slides/sample_test`;
    /// 3. `$SLIDE_NETWORK_DIR`, 否则 `$HOME/slides/dsb2018_topcoders`;
    /// 4. `$SLIDE_TILE_SIZE`, 否则 1000;
    /// 5. `$SLIDE_WORKERS`, 否则为可并行核心数;
    /// 6. `$SLIDE_FEATURES`, 否则 `all`;
    /// 7. `$SLIDE_FORCE`, 否则覆写.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            image: path_from_env_or_home(IMAGE_VAR, "test_img.jpg")?,
            sample_dir: path_from_env_or_home(SAMPLE_DIR_VAR, "sample_test")?,
            network_dir: path_from_env_or_home(NETWORK_DIR_VAR, "dsb2018_topcoders")?,
            tile_size: parse_positive(TILE_SIZE_VAR, DEFAULT_TILE_SIZE)?,
            workers: parse_positive(WORKERS_VAR, crate::cpus())?,
            features: non_empty(FEATURES_VAR).unwrap_or_else(|| "all".to_owned()),
            force: parse_flag(FORCE_VAR, true)?,
        })
    }

    /// 与图块目录同级、带后缀的兄弟路径 `{sample_dir}{suffix}`.
    pub fn sibling(&self, suffix: &str) -> PathBuf {
        let mut s = self.sample_dir.clone().into_os_string();
        s.push(suffix);
        PathBuf::from(s)
    }

    /// 网络预测结果的本地副本 `{sample_dir}_segmented`.
    #[inline]
    pub fn segmented_dir(&self) -> PathBuf {
        self.sibling("_segmented")
    }

    /// 网格布局文件 `{sample_dir}.layout`.
    #[inline]
    pub fn layout_path(&self) -> PathBuf {
        self.sibling(".layout")
    }

    /// 全局标签图 `{sample_dir}_labels.npy`.
    #[inline]
    pub fn labels_path(&self) -> PathBuf {
        self.sibling("_labels.npy")
    }

    /// 特征表 `{sample_dir}_features.csv`.
    #[inline]
    pub fn features_path(&self) -> PathBuf {
        self.sibling("_features.csv")
    }
}

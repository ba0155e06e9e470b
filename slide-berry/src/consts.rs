//! 通用常量.

/// 标签掩码.
pub mod label {
    /// 标签掩码中背景的像素值.
    pub const BACKGROUND: u32 = 0;

    /// 像素是否是背景?
    #[inline]
    pub const fn is_background(p: u32) -> bool {
        p == BACKGROUND
    }

    /// 像素是否属于某个实例?
    #[inline]
    pub const fn is_instance(p: u32) -> bool {
        p != BACKGROUND
    }
}

/// 图块存储布局.
pub mod layout {
    /// 块名中 `base`, `x`, `y` 之间的分隔符.
    pub const NAME_SEP: char = '_';

    /// 分级布局中, 每个图块目录下存放图像的子目录名.
    pub const IMAGES_DIR: &str = "images";

    /// 写出图块时使用的扩展名.
    pub const TILE_EXT: &str = "png";

    /// 读取扁平布局时可以识别的扩展名.
    pub const KNOWN_EXTS: [&str; 5] = ["png", "tif", "tiff", "npy", "bmp"];
}

/// 椭圆特征.
pub mod ellipse {
    /// 拟合所需的最少轮廓点数.
    pub const MIN_POINTS: usize = 5;

    /// 长轴超过该值 (像素) 时视为图块边缘处的拟合伪影.
    pub const AXIS_LIMIT: f64 = 100.0;

    /// 伪影被钳制后的轴长 (像素).
    pub const AXIS_FALLBACK: f64 = 30.0;
}

/// Rec. 709 亮度系数, 与 `image` crate 的灰度转换保持一致.
pub const LUMA: [f64; 3] = [0.2126, 0.7152, 0.0722];

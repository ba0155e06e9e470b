//! 外部分割网络.
//!
//! 网络被视作一个批处理进程: 它在自己的工作目录中读取 `data_test/`,
//! 运行 `predict_test.sh`, 并把逐块标签掩码写到 `predictions/`.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

/// 网络的预测脚本.
pub const PREDICT_SCRIPT: &str = "predict_test.sh";

/// 网络的输入目录名.
pub const INPUT_DIR: &str = "data_test";

/// 网络的输出目录名.
pub const OUTPUT_DIR: &str = "predictions";

/// 每次运行前需要清理的中间结果目录.
const STALE_DIRS: [&str; 2] = [OUTPUT_DIR, "albu/results_test"];

/// 调用外部网络时的错误.
#[derive(Debug)]
pub enum NetworkError {
    /// 底层 I/O 错误.
    Io(io::Error),

    /// 工作目录中没有预测脚本.
    MissingScript(PathBuf),

    /// 预测脚本以非零状态退出. 被信号终止时为 `None`.
    Exit(Option<i32>),

    /// 预测脚本没有产出任何文件.
    NoOutput(PathBuf),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O 错误: {e}"),
            Self::MissingScript(p) => write!(f, "找不到预测脚本 {}", p.display()),
            Self::Exit(Some(c)) => write!(f, "预测脚本退出码为 {c}"),
            Self::Exit(None) => write!(f, "预测脚本被信号终止"),
            Self::NoOutput(p) => write!(f, "预测目录 {} 为空", p.display()),
        }
    }
}

impl std::error::Error for NetworkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for NetworkError {
    #[inline]
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// 递归复制目录 `src` 的内容到 `dst` (已存在的文件被覆盖). 返回复制的文件数.
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<usize> {
    fs::create_dir_all(dst)?;
    let mut copied = 0;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copied += copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// 删除目录 (若存在).
fn remove_if_exists(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        r => r,
    }
}

/// 外部分割网络的工作目录.
#[derive(Clone, Debug)]
pub struct Network {
    root: PathBuf,
}

impl Network {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_owned(),
        }
    }

    #[inline]
    pub fn input_dir(&self) -> PathBuf {
        self.root.join(INPUT_DIR)
    }

    #[inline]
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }

    /// 把 `sample_dir` 中的图块复制到网络的输入目录, 并清理上一次的输出.
    pub fn stage(&self, sample_dir: &Path) -> Result<usize, NetworkError> {
        let input = self.input_dir();
        remove_if_exists(&input)?;
        let n = copy_tree(sample_dir, &input)?;
        for stale in STALE_DIRS {
            remove_if_exists(&self.root.join(stale))?;
        }
        log::info!("Staged {n} files into {}", input.display());
        Ok(n)
    }

    /// 在工作目录中运行预测脚本, 等待其结束.
    pub fn predict(&self) -> Result<(), NetworkError> {
        let script = self.root.join(PREDICT_SCRIPT);
        if !script.is_file() {
            return Err(NetworkError::MissingScript(script));
        }
        log::info!("Running {}", script.display());
        let status = Command::new("bash")
            .arg(PREDICT_SCRIPT)
            .current_dir(&self.root)
            .status()?;
        if !status.success() {
            return Err(NetworkError::Exit(status.code()));
        }
        Ok(())
    }

    /// 把预测结果复制到 `dest`. 返回复制的文件数.
    pub fn collect(&self, dest: &Path) -> Result<usize, NetworkError> {
        let output = self.output_dir();
        let empty = match fs::read_dir(&output) {
            Ok(mut it) => it.next().is_none(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };
        if empty {
            return Err(NetworkError::NoOutput(output));
        }
        let n = copy_tree(&output, dest)?;
        log::info!("Collected {n} predictions into {}", dest.display());
        Ok(n)
    }
}

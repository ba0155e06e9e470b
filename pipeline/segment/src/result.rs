//! 运行结果.

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

/// 一次流水线运行的结果.
#[derive(Debug, Default)]
pub struct SegmentReport {
    /// 各阶段名称与耗时, 按执行顺序.
    pub stages: Vec<(&'static str, Duration)>,

    /// 原图形状 `(h, w, c)`.
    pub image_shape: Vec<usize>,

    /// 图块数 `(x, y)`.
    pub grid: (usize, usize),

    /// 拼接后的全局实例数.
    pub instances: u32,

    /// 特征表行数.
    pub rows: usize,

    /// 输出文件.
    pub outputs: Vec<PathBuf>,
}

impl SegmentReport {
    /// 记录一个阶段的耗时.
    #[inline]
    pub fn stage(&mut self, name: &'static str, elapsed: Duration) {
        log::info!("Stage `{name}` finished in {} ms", elapsed.as_millis());
        self.stages.push((name, elapsed));
    }

    /// 将结果写进 `w` 中.
    pub fn describe_into<W: Write>(&self, w: &mut W) -> io::Result<()> {
        const S4: &str = "    ";

        writeln!(w, "Image shape: {:?}", self.image_shape)?;
        writeln!(w, "Grid: {} x {} tiles", self.grid.0, self.grid.1)?;
        writeln!(w, "Instances after merge: {}", self.instances)?;
        writeln!(w, "Feature rows: {}", self.rows)?;
        writeln!(w, "Stages:")?;
        for (name, d) in self.stages.iter() {
            writeln!(w, "{S4}{name}: {} ms", d.as_millis())?;
        }
        let total: Duration = self.stages.iter().map(|(_, d)| *d).sum();
        writeln!(w, "{S4}total: {} ms", total.as_millis())?;
        write!(w, "Outputs:")?;
        for p in self.outputs.iter() {
            write!(w, "\n{S4}{}", p.display())?;
        }
        Ok(())
    }

    /// 打印运行结果.
    pub fn analyze(&self) {
        utils::sep();
        let mut buf = Vec::with_capacity(512);
        match self.describe_into(&mut buf) {
            Ok(()) => println!("{}", String::from_utf8_lossy(&buf)),
            Err(e) => log::error!("Cannot describe report: {e}"),
        }
        utils::sep();
    }
}

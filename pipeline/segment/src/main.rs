//! 全切片图像分割流水线: 切分, 调用外部分割网络, 拼接标签, 提取细胞核特征.

mod network;
mod result;
mod runner;

use std::error::Error;
use utils::config::SegmentConfig;

fn main() -> Result<(), Box<dyn Error>> {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .env()
        .init()?;

    let config = SegmentConfig::from_env()?;
    utils::sep();
    println!("Image: {}", config.image.display());
    println!("Samples: {}", config.sample_dir.display());
    println!("Network: {}", config.network_dir.display());
    utils::sep();

    let report = runner::run(&config)?;
    report.analyze();
    Ok(())
}

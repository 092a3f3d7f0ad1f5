use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::engine::{LifecycleEvent, VenueId};

#[derive(Parser, Debug)]
#[command(name = "hookmux", version, about = "多扩展生命周期回调编排器")]
pub struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径（默认查找 hookmux.toml 或 config/hookmux.toml）"
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 初始化配置模版文件
    Init(InitCmd),
    /// 校验配置并打印各场所的扩展与费率
    Check,
    /// 使用配置中的固定扩展模拟一次生命周期分发
    Simulate(SimulateCmd),
    /// 装配编排器并保持指标导出，直到收到 Ctrl-C
    Run,
}

#[derive(Args, Debug)]
pub struct InitCmd {
    #[arg(long, value_name = "DIR", help = "可选输出目录（默认当前目录）")]
    pub output: Option<PathBuf>,
    #[arg(long, help = "若文件存在则覆盖")]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct SimulateCmd {
    #[arg(long, value_name = "ID", help = "场所 ID（base58）")]
    pub venue: VenueId,
    #[arg(
        long,
        value_name = "EVENT",
        help = "生命周期事件，例如 before_swap、after-add-liquidity"
    )]
    pub event: LifecycleEvent,
    #[arg(
        long,
        default_value_t = -1_000_000i128,
        allow_negative_numbers = true,
        help = "指定数量；swap 中负数为 exact-in，正数为 exact-out"
    )]
    pub amount: i128,
    #[arg(long, help = "swap 方向为 token0 → token1")]
    pub zero_for_one: bool,
}

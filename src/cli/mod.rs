//! 命令行入口：解析参数，装配编排器，并执行 init / check / simulate / run。

mod runner;

pub mod args;
pub mod context;

pub use runner::run;

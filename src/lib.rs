//! hookmux：把多个扩展挂在同一个生命周期回调目标之后，按注册顺序分发、
//! 合并 Delta 并仲裁费率。
//!
//! 库部分提供编排器本体（[`engine`]）、配置装配（[`config`]）与内置扩展；
//! 二进制入口只负责命令行与日志初始化。

pub mod cli;
pub mod config;
pub mod engine;
pub mod extensions;
pub mod monitoring;

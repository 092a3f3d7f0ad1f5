//! 内置扩展实现。

mod fixed;

pub use fixed::FixedExtension;

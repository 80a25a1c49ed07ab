//! Data models for hfwatch

mod alert;
mod subscription;

pub use alert::*;
pub use subscription::*;

pub mod args;
pub mod op;
pub mod ops;

pub use ops::{Anchor, Chain, Daemon, Health, Init, Record, Version};

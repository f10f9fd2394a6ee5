pub mod chunks;
pub mod compression;

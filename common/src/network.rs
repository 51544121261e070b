pub mod device;
pub mod range;
pub mod target;

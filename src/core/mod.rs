pub mod laser;
pub mod video;

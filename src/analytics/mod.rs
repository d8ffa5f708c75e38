pub mod ranking;
pub mod scoring;

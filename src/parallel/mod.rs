pub mod collector;
pub mod merger;

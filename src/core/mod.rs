pub mod autoplay;
pub mod engine;
pub mod lint;
pub mod story;

pub mod handler;
pub mod observer;
pub mod strategy;

pub use handler::*;
pub use observer::*;
pub use strategy::*;

pub mod api;
pub mod config;
pub mod error;
pub mod executor;
pub mod optimizer;
pub mod pipeline;
pub mod planner;
pub mod safety;
pub mod task;

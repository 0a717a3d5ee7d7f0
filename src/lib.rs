pub mod catalog;
pub mod fetch;
pub mod mirror;
pub mod pipeline;

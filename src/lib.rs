pub mod api;
pub mod core;
pub mod signals;
pub mod store;

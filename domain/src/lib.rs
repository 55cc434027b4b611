pub mod backend;
pub mod models;
pub mod session;
pub mod store;

pub mod models;
pub mod period;
pub mod scope;

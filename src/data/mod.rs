pub mod baseline;
pub mod models;

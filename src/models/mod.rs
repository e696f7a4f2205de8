pub mod label;
pub mod detection;

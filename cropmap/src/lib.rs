pub mod boundary;
pub mod config;
pub mod ops;
pub mod staging;

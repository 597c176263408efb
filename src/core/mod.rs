/// Dialect: the configuration shared by readers and writers.
pub mod dialect;

pub mod item;

pub mod step;

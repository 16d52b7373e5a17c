pub mod aggregation;
pub mod employee;
pub mod epidemiology;
pub mod profile;
pub mod upstream;

pub mod building;
pub mod common;
pub mod district;
pub mod plant;
pub mod schedule;
pub mod units;

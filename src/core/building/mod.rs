pub mod hydraulics;
pub mod parameters;

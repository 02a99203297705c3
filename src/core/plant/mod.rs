pub mod cup;
pub mod load_shift;

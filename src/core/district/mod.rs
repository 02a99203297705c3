pub mod mixing;

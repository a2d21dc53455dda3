pub mod scoring;
pub mod table;

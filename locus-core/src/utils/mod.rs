pub mod digest;
pub mod logbook;
pub mod path;

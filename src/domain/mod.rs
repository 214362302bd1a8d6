pub mod track;
pub mod video;

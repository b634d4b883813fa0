pub mod bounds;
pub mod color;
pub mod snapshot;
pub mod track;

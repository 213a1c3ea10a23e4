pub mod elementwise;
pub mod graph;

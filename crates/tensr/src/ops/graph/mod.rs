mod arena;
mod builder;
mod state;

pub use arena::GraphArena;
pub use builder::GraphBuilder;

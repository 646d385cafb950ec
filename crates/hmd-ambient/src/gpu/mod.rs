pub mod context;
pub mod error;
pub mod reducer;
pub mod tiles;
pub mod types;

pub use context::GpuContext;
pub use error::RenderError;
pub use reducer::TileReducer;

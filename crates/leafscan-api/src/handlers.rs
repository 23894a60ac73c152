//! Request handlers.

pub mod download;
pub mod health;
pub mod plants;
pub mod predict;

pub use download::*;
pub use health::*;
pub use plants::*;
pub use predict::*;

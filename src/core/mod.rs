pub mod device;
pub mod generation;
pub mod loader;
pub mod model;

pub use crate::domain::model::GenerationParams;
pub use crate::domain::ports::{ConfigProvider, TextGenerator};
pub use crate::utils::error::Result;

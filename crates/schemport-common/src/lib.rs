pub mod error;
pub mod types;

pub use error::PortError;
pub use types::{Dimensions, Edition, Result};

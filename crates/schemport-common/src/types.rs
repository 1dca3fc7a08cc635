use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, crate::error::PortError>;

/// Bounding-box size of a structure. All axes must be positive; validation
/// happens in the model crate, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Dimensions {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Dimensions { x, y, z }
    }

    /// Total cell count, widened so adversarial dimensions cannot overflow.
    pub fn volume(&self) -> i64 {
        self.x as i64 * self.y as i64 * self.z as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edition {
    Java,
    Bedrock,
}

impl Edition {
    pub fn name(&self) -> &'static str {
        match self {
            Edition::Java => "java",
            Edition::Bedrock => "bedrock",
        }
    }
}

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Camera {
    /// Looks down +Z from `position`; the screen plane sits one unit in front of it.
    Fixed { name: String, position: [f32; 3] },
}

impl Camera {
    pub fn get_name(&self) -> &str {
        match self {
            Self::Fixed { name, .. } => name,
        }
    }

    pub fn get_position(&self) -> [f32; 3] {
        match self {
            Self::Fixed { position, .. } => *position,
        }
    }
}

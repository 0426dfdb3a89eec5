use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Light {
    Point { name: String, position: [f32; 3] },
}

impl Light {
    pub fn get_name(&self) -> &str {
        match self {
            Self::Point { name, .. } => name,
        }
    }

    pub fn get_position(&self) -> [f32; 3] {
        match self {
            Self::Point { position, .. } => *position,
        }
    }
}

use serde::{Deserialize, Serialize};

pub const DEFAULT_ORBIT_PIVOT: [f32; 3] = [0.0, 1.5, 4.0];
pub const DEFAULT_ORBIT_DEGREES_PER_SECOND: f32 = 50.0;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Motion {
    /// Rotates about a vertical axis through `pivot`.
    Orbit {
        #[serde(default = "default_orbit_pivot")]
        pivot: [f32; 3],

        #[serde(default = "default_orbit_speed")]
        degrees_per_second: f32,
    },

    /// Moves in the XY plane, reflecting off the edges of the visible world rectangle.
    Bounce {
        /// World units per second.
        velocity: [f32; 2],
    },
}

fn default_orbit_pivot() -> [f32; 3] {
    DEFAULT_ORBIT_PIVOT
}

fn default_orbit_speed() -> f32 {
    DEFAULT_ORBIT_DEGREES_PER_SECOND
}

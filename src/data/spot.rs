//! Spot definitions and wind orientation helpers
//!
//! A spot is a named coastal location. Spots are loaded from the configuration
//! file; each one may carry the compass direction its beach faces, which is
//! used to describe the wind relative to the shore.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A forecast location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spot {
    /// Unique identifier, also the `spotId` column in the store
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Latitude coordinate
    pub latitude: f64,
    /// Longitude coordinate
    pub longitude: f64,
    /// Whether tide data should be computed for this spot
    #[serde(default)]
    pub has_tides: bool,
    /// Direction the shore faces
    #[serde(default)]
    pub direction: Option<CompassDirection>,
    /// Row id of this spot in the spots table, used for status rotation
    #[serde(default)]
    pub record_id: Option<String>,
}

impl Spot {
    /// Describes a wind direction relative to this spot's shore
    pub fn relative_direction(&self, wind: CompassDirection) -> RelativeDirection {
        match self.direction {
            Some(facing) => RelativeDirection::between(facing, wind),
            None => RelativeDirection::Unknown,
        }
    }
}

/// Eight-point compass direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompassDirection {
    #[serde(rename = "North")]
    North,
    #[serde(rename = "North-east")]
    NorthEast,
    #[serde(rename = "East")]
    East,
    #[serde(rename = "South-east")]
    SouthEast,
    #[serde(rename = "South")]
    South,
    #[serde(rename = "South-west")]
    SouthWest,
    #[serde(rename = "West")]
    West,
    #[serde(rename = "North-west")]
    NorthWest,
}

impl CompassDirection {
    /// Clockwise order starting at North
    const ALL: [CompassDirection; 8] = [
        CompassDirection::North,
        CompassDirection::NorthEast,
        CompassDirection::East,
        CompassDirection::SouthEast,
        CompassDirection::South,
        CompassDirection::SouthWest,
        CompassDirection::West,
        CompassDirection::NorthWest,
    ];

    /// Maps a bearing in degrees to its 45° sector (North covers 337.5..22.5)
    pub fn from_degrees(degrees: f64) -> Self {
        let normalized = degrees.rem_euclid(360.0);
        let sector = ((normalized + 22.5) / 45.0).floor() as usize % 8;
        Self::ALL[sector]
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|d| *d == self).unwrap_or(0)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompassDirection::North => "North",
            CompassDirection::NorthEast => "North-east",
            CompassDirection::East => "East",
            CompassDirection::SouthEast => "South-east",
            CompassDirection::South => "South",
            CompassDirection::SouthWest => "South-west",
            CompassDirection::West => "West",
            CompassDirection::NorthWest => "North-west",
        }
    }
}

impl fmt::Display for CompassDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wind direction relative to the shore
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelativeDirection {
    Onshore,
    SideOnshore,
    Sideshore,
    SideOffshore,
    Offshore,
    Unknown,
}

impl RelativeDirection {
    /// Classifies by the number of compass sectors between shore and wind
    pub fn between(facing: CompassDirection, wind: CompassDirection) -> Self {
        let diff = (facing.index() as i32 - wind.index() as i32).rem_euclid(8);
        match diff.min(8 - diff) {
            0 => RelativeDirection::Onshore,
            1 => RelativeDirection::SideOnshore,
            2 => RelativeDirection::Sideshore,
            3 => RelativeDirection::SideOffshore,
            _ => RelativeDirection::Offshore,
        }
    }
}

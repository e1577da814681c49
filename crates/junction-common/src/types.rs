//! Core types shared across junction components.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::JunctionError;

/// Junction identifier (always positive)
pub type JunctionId = u32;

/// One of the four compass approaches to a junction.
///
/// Declaration order is the hint wire order and the override priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// All directions in wire/priority order
    pub const ALL: [Direction; 4] = [Self::North, Self::East, Self::South, Self::West];

    /// Position of this direction in a hint message
    pub fn index(self) -> usize {
        match self {
            Self::North => 0,
            Self::East => 1,
            Self::South => 2,
            Self::West => 3,
        }
    }

    pub fn axis(self) -> Axis {
        match self {
            Self::North | Self::South => Axis::NorthSouth,
            Self::East | Self::West => Axis::EastWest,
        }
    }

    /// Lowercase name, as used in world-state paths and config
    pub fn as_str(self) -> &'static str {
        match self {
            Self::North => "north",
            Self::East => "east",
            Self::South => "south",
            Self::West => "west",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = JunctionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "north" => Ok(Self::North),
            "east" => Ok(Self::East),
            "south" => Ok(Self::South),
            "west" => Ok(Self::West),
            other => Err(JunctionError::Config(format!("Unknown direction: {}", other))),
        }
    }
}

/// Opposing pair of directions sharing a light state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    NorthSouth,
    EastWest,
}

impl Axis {
    pub fn directions(self) -> [Direction; 2] {
        match self {
            Self::NorthSouth => [Direction::North, Direction::South],
            Self::EastWest => [Direction::East, Direction::West],
        }
    }
}

/// Flow decision: one bit per direction, `true` meaning traffic moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flow([bool; 4]);

impl Flow {
    pub const ALL_RED: Flow = Flow([false; 4]);

    pub fn new(north: bool, east: bool, south: bool, west: bool) -> Self {
        Self([north, east, south, west])
    }

    /// Flow with exactly one axis moving
    pub fn axis(axis: Axis) -> Self {
        let mut flow = Self::ALL_RED;
        for direction in axis.directions() {
            flow.set(direction, true);
        }
        flow
    }

    pub fn get(&self, direction: Direction) -> bool {
        self.0[direction.index()]
    }

    pub fn set(&mut self, direction: Direction, moving: bool) {
        self.0[direction.index()] = moving;
    }

    /// Bits in wire order (north, east, south, west)
    pub fn bits(&self) -> [bool; 4] {
        self.0
    }
}

impl From<[bool; 4]> for Flow {
    fn from(bits: [bool; 4]) -> Self {
        Self(bits)
    }
}

/// Light state of one branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Light {
    Red,
    Green,
}

impl Light {
    pub fn from_bit(moving: bool) -> Self {
        if moving { Self::Green } else { Self::Red }
    }

    pub fn is_green(&self) -> bool {
        matches!(self, Self::Green)
    }
}

/// Resolved light state of all four branches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lights([Light; 4]);

impl Lights {
    pub fn get(&self, direction: Direction) -> Light {
        self.0[direction.index()]
    }
}

impl From<Flow> for Lights {
    fn from(flow: Flow) -> Self {
        Self(flow.bits().map(Light::from_bit))
    }
}

impl fmt::Display for Lights {
    /// Renders as `N:G E:R S:G W:R`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, direction) in Direction::ALL.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            let initial = direction.as_str()[..1].to_ascii_uppercase();
            let colour = if self.get(*direction).is_green() { "G" } else { "R" };
            write!(f, "{}:{}", initial, colour)?;
        }
        Ok(())
    }
}

/// Vehicle counts of the four branches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BranchCounts {
    pub north: u32,
    pub east: u32,
    pub south: u32,
    pub west: u32,
}

impl BranchCounts {
    pub fn north_south(&self) -> u64 {
        u64::from(self.north) + u64::from(self.south)
    }

    pub fn east_west(&self) -> u64 {
        u64::from(self.east) + u64::from(self.west)
    }
}

/// Junction adjacent to each approach, fixed for the process lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NeighbourMap([Option<JunctionId>; 4]);

impl NeighbourMap {
    pub fn isolated() -> Self {
        Self::default()
    }

    pub fn with(mut self, direction: Direction, neighbour: JunctionId) -> Self {
        self.0[direction.index()] = Some(neighbour);
        self
    }

    pub fn get(&self, direction: Direction) -> Option<JunctionId> {
        self.0[direction.index()]
    }

    /// Configured neighbours in wire order
    pub fn iter(&self) -> impl Iterator<Item = (Direction, JunctionId)> + '_ {
        Direction::ALL
            .into_iter()
            .filter_map(|direction| self.get(direction).map(|id| (direction, id)))
    }
}

/// Optional hint-protocol hardening
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protections {
    /// Provision the hint area before publishing
    #[serde(default)]
    pub dos: bool,

    /// Prefix hints with the publisher id and verify it on read
    #[serde(default)]
    pub repudiation: bool,
}

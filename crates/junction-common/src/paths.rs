//! World-state key layout for a junction.
//!
//! A junction is a small entity tree: the junction node owns four branch
//! nodes, each with a `vehicle_count` and a `light` field. A node's path is
//! its parent's path joined to its own segment with `::`, so the north light
//! of junction 3 lives at `junction-3::north::light`.

use crate::constants::{junction_name, world_keys};
use crate::types::{Direction, JunctionId};

/// Join a child segment onto its parent's path
pub fn join(parent: &str, segment: &str) -> String {
    format!("{}{}{}", parent, world_keys::PATH_SEPARATOR, segment)
}

/// Keys of one branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchPaths {
    pub vehicle_count: String,
    pub light: String,
}

impl BranchPaths {
    fn new(junction_path: &str, direction: Direction) -> Self {
        let branch = join(junction_path, direction.as_str());
        Self {
            vehicle_count: join(&branch, world_keys::VEHICLE_COUNT),
            light: join(&branch, world_keys::LIGHT),
        }
    }
}

/// Keys of one junction and its four branches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JunctionPaths {
    branches: [BranchPaths; 4],
}

impl JunctionPaths {
    pub fn new(id: JunctionId) -> Self {
        let root = junction_name(id);
        let branches = Direction::ALL.map(|direction| BranchPaths::new(&root, direction));
        Self { branches }
    }

    pub fn branch(&self, direction: Direction) -> &BranchPaths {
        &self.branches[direction.index()]
    }
}

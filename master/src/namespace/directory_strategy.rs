use rand::{Rng, SeedableRng, rngs::StdRng};
use utilities::logger::info;

use cluster::{DirectoryId, ROOT_DIRECTORY_ID, operation::Operation};

use super::selection::{ParentWeighting, UniformWeighting, horizon};
use crate::config::DirectoryStrategyKind;

pub struct DirectoryCreationStrategy {
    masters: u64,
    weighting: Box<dyn ParentWeighting>,
    rng: StdRng,
}

impl DirectoryCreationStrategy {
    pub fn new(masters: u64, weighting: Box<dyn ParentWeighting>, rng: StdRng) -> Self {
        Self {
            masters: masters.max(1),
            weighting,
            rng,
        }
    }

    pub fn from_kind(kind: DirectoryStrategyKind, masters: u64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        if kind == DirectoryStrategyKind::Preferential {
            info!("preferential directory strategy selects parents uniformly");
        }
        Self::new(masters, Box::new(UniformWeighting), rng)
    }

    pub fn select_parent(&mut self, index: u64) -> (DirectoryId, bool) {
        let visible = horizon(index, self.masters).saturating_sub(1).max(1);
        let parent = self.weighting.select(visible, &mut self.rng);
        // the root's parent is the working directory, not an entry
        let use_grandparent = parent != ROOT_DIRECTORY_ID && self.rng.random_bool(0.5);
        (parent, use_grandparent)
    }

    pub fn create_next_directory(&mut self, index: DirectoryId) -> Operation {
        let (parent_id, use_grandparent) = self.select_parent(index);
        Operation::CreateDir {
            id: index,
            parent_id: Some(parent_id),
            use_grandparent,
        }
    }
}

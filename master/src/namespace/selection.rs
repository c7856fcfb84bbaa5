use std::collections::HashMap;

use rand::{Rng, rngs::StdRng};
use rand_distr::{Distribution, Zipf};

use cluster::DirectoryId;

/// Upper bound (exclusive) of the ids a master may reference when creating
/// directory `index` while `masters` masters create concurrently.
///
/// Masters advance in rounds of `masters` consecutive indices; every id of an
/// earlier round was created by a master that already moved on, so it is
/// visible in the namespace map. Ids of the current round may still be in
/// flight.
pub fn horizon(index: u64, masters: u64) -> u64 {
    if index <= masters {
        index
    } else {
        index - ((index - 1) % masters)
    }
}

pub trait ParentWeighting: Send + Sync {
    fn select(&mut self, visible: u64, rng: &mut StdRng) -> DirectoryId;
}

#[derive(Debug, Default)]
pub struct UniformWeighting;

impl ParentWeighting for UniformWeighting {
    fn select(&mut self, visible: u64, rng: &mut StdRng) -> DirectoryId {
        rng.random_range(1..=visible.max(1))
    }
}

#[derive(Debug)]
pub enum IdDistribution {
    Uniform,
    Zipfian {
        exponent: f64,
        // one distribution per population size, sizes change between phases only
        cache: HashMap<u64, Zipf<f64>>,
    },
}

impl IdDistribution {
    pub fn zipfian(exponent: f64) -> Self {
        Self::Zipfian {
            exponent,
            cache: HashMap::new(),
        }
    }

    pub fn sample(&mut self, population: u64, rng: &mut StdRng) -> Option<u64> {
        if population == 0 {
            return None;
        }
        match self {
            Self::Uniform => Some(rng.random_range(1..=population)),
            Self::Zipfian { exponent, cache } => {
                if !cache.contains_key(&population) {
                    let zipf = Zipf::new(population as f64, *exponent).ok()?;
                    cache.insert(population, zipf);
                }
                let zipf = cache.get(&population)?;
                let rank = zipf.sample(rng) as u64;
                Some(rank.clamp(1, population))
            }
        }
    }
}

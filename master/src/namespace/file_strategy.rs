use rand::rngs::StdRng;

use crate::config::FileStrategyKind;

use cluster::{DirectoryId, FileId, operation::Operation};

use super::selection::IdDistribution;

pub trait FileCreationStrategy: Send + Sync {
    fn select_directory(&mut self, directories: u64) -> Option<DirectoryId>;

    fn create_next_file(&mut self, id: FileId, directories: u64) -> Option<Operation> {
        let parent_id = self.select_directory(directories)?;
        Some(Operation::CreateFile { id, parent_id })
    }
}

#[derive(Debug)]
pub struct ZipfianFileStrategy {
    distribution: IdDistribution,
    rng: StdRng,
}

impl ZipfianFileStrategy {
    pub fn new(exponent: f64, rng: StdRng) -> Self {
        Self {
            distribution: IdDistribution::zipfian(exponent),
            rng,
        }
    }
}

impl FileCreationStrategy for ZipfianFileStrategy {
    fn select_directory(&mut self, directories: u64) -> Option<DirectoryId> {
        self.distribution.sample(directories, &mut self.rng)
    }
}

#[derive(Debug)]
pub struct UniformFileStrategy {
    rng: StdRng,
}

impl UniformFileStrategy {
    pub fn new(rng: StdRng) -> Self {
        Self { rng }
    }
}

impl FileCreationStrategy for UniformFileStrategy {
    fn select_directory(&mut self, directories: u64) -> Option<DirectoryId> {
        IdDistribution::Uniform.sample(directories, &mut self.rng)
    }
}

pub fn file_strategy(
    kind: FileStrategyKind,
    zipf_exponent: f64,
    rng: StdRng,
) -> Box<dyn FileCreationStrategy> {
    match kind {
        FileStrategyKind::Zipfian => Box::new(ZipfianFileStrategy::new(zipf_exponent, rng)),
        FileStrategyKind::Uniform => Box::new(UniformFileStrategy::new(rng)),
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    fn placement(strategy: &mut dyn FileCreationStrategy, samples: usize) -> Vec<u64> {
        let mut counts = vec![0u64; 100];
        for _ in 0..samples {
            let dir = strategy.select_directory(100).unwrap();
            assert!((1..=100).contains(&dir));
            counts[(dir - 1) as usize] += 1;
        }
        counts
    }

    #[test]
    fn zipfian_placement_favours_low_directory_ids() {
        let mut strategy = ZipfianFileStrategy::new(0.99, StdRng::seed_from_u64(42));
        let counts = placement(&mut strategy, 10_000);
        let first_ten: u64 = counts[..10].iter().sum();
        let last_ten: u64 = counts[90..].iter().sum();
        assert!(counts[0] > counts[9]);
        assert!(counts[0] > counts[99] * 5);
        // with s close to 1 the top decile holds more than half of the files
        assert!(first_ten > 5_000, "first ten directories got {first_ten}");
        assert!(first_ten > last_ten * 5);
    }

    #[test]
    fn uniform_placement_spreads_files() {
        let mut strategy = UniformFileStrategy::new(StdRng::seed_from_u64(42));
        let counts = placement(&mut strategy, 10_000);
        assert!(counts.iter().all(|count| (40..=170).contains(count)));
    }

    #[test]
    fn no_file_without_a_directory() {
        let mut strategy = ZipfianFileStrategy::new(0.99, StdRng::seed_from_u64(1));
        assert!(strategy.create_next_file(1, 0).is_none());
        assert_eq!(
            strategy.create_next_file(9, 1),
            Some(Operation::CreateFile { id: 9, parent_id: 1 })
        );
    }
}

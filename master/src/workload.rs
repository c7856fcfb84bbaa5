use std::sync::Arc;

use rand::{distr::weighted::WeightedIndex, rngs::StdRng};
use rand_distr::Distribution;
use utilities::logger::{info, instrument};

use cluster::{dispatcher::OperationDispatcher, operation::Operation};

use crate::{
    config::{TargetSelection, WorkloadConfig},
    error::MasterError,
    namespace::selection::IdDistribution,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkloadOperation {
    Create,
    Delete,
    Open,
    ListDir,
    ListFile,
    Rename,
    Move,
}

impl WorkloadOperation {
    pub const ALL: [WorkloadOperation; 7] = [
        WorkloadOperation::Create,
        WorkloadOperation::Delete,
        WorkloadOperation::Open,
        WorkloadOperation::ListDir,
        WorkloadOperation::ListFile,
        WorkloadOperation::Rename,
        WorkloadOperation::Move,
    ];

    fn needs_directory(&self) -> bool {
        matches!(
            self,
            WorkloadOperation::Create | WorkloadOperation::ListDir | WorkloadOperation::Move
        )
    }

    fn needs_file(&self) -> bool {
        !matches!(self, WorkloadOperation::Create | WorkloadOperation::ListDir)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Population {
    pub directories: u64,
    pub files: u64,
}

pub struct WorkloadGenerator {
    population: Population,
    kinds: Vec<WorkloadOperation>,
    chooser: WeightedIndex<f64>,
    targets: IdDistribution,
    rng: StdRng,
    lane: u64,
    masters: u64,
}

impl WorkloadGenerator {
    pub fn new(
        config: &WorkloadConfig,
        zipf_exponent: f64,
        population: Population,
        lane: u64,
        masters: u64,
        rng: StdRng,
    ) -> Result<Self, MasterError> {
        let (kinds, weights): (Vec<_>, Vec<_>) = WorkloadOperation::ALL
            .into_iter()
            .zip(config.weights.as_array())
            .filter(|(kind, weight)| {
                *weight > 0.0
                    && (!kind.needs_directory() || population.directories > 0)
                    && (!kind.needs_file() || population.files > 0)
            })
            .unzip();
        if kinds.is_empty() {
            return Err(MasterError::EmptyNamespace);
        }
        let chooser =
            WeightedIndex::new(weights).map_err(|e| MasterError::InvalidWeights(e.to_string()))?;
        let targets = match config.target_selection {
            TargetSelection::Uniform => IdDistribution::Uniform,
            TargetSelection::Zipfian => IdDistribution::zipfian(zipf_exponent),
        };
        Ok(Self {
            population,
            kinds,
            chooser,
            targets,
            rng,
            lane,
            masters: masters.max(1),
        })
    }

    fn directory(&mut self) -> u64 {
        self.targets
            .sample(self.population.directories, &mut self.rng)
            .unwrap_or(cluster::ROOT_DIRECTORY_ID)
    }

    fn file(&mut self) -> u64 {
        self.targets
            .sample(self.population.files, &mut self.rng)
            .unwrap_or(1)
    }

    pub fn next_operation(&mut self, sequence: u64) -> Operation {
        let kind = self.kinds[self.chooser.sample(&mut self.rng)];
        match kind {
            // fresh ids above the population never collide across masters
            WorkloadOperation::Create => Operation::CreateFile {
                id: self.population.files + sequence,
                parent_id: self.directory(),
            },
            WorkloadOperation::Delete => Operation::Delete { file_id: self.file() },
            WorkloadOperation::Open => Operation::Open { file_id: self.file() },
            WorkloadOperation::ListDir => Operation::ListDir {
                dir_id: self.directory(),
            },
            WorkloadOperation::ListFile => Operation::ListFile { file_id: self.file() },
            WorkloadOperation::Rename => Operation::Rename { file_id: self.file() },
            WorkloadOperation::Move => {
                let file_id = self.file();
                Operation::Move {
                    file_id,
                    target_dir_id: self.directory(),
                }
            }
        }
    }

    #[instrument(name = "master_generate_workload", skip(self, dispatcher), fields(lane = self.lane))]
    pub fn generate(
        &mut self,
        operations: u64,
        dispatcher: &Arc<dyn OperationDispatcher>,
    ) -> Result<u64, MasterError> {
        let mut dispatched = 0;
        for sequence in 1..=operations {
            if (sequence - 1) % self.masters != self.lane {
                continue;
            }
            dispatcher.dispatch(self.next_operation(sequence))?;
            dispatched += 1;
        }
        info!(dispatched, population = ?self.population, "Dispatched workload operations");
        Ok(dispatched)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::SeedableRng;

    use super::*;
    use crate::{config::OperationWeights, test_support::RecordingDispatcher};

    const POPULATION: Population = Population {
        directories: 50,
        files: 200,
    };

    fn kind_of(operation: &Operation) -> WorkloadOperation {
        match operation {
            Operation::CreateFile { .. } => WorkloadOperation::Create,
            Operation::Delete { .. } => WorkloadOperation::Delete,
            Operation::Open { .. } => WorkloadOperation::Open,
            Operation::ListDir { .. } => WorkloadOperation::ListDir,
            Operation::ListFile { .. } => WorkloadOperation::ListFile,
            Operation::Rename { .. } => WorkloadOperation::Rename,
            Operation::Move { .. } => WorkloadOperation::Move,
            Operation::CreateDir { .. } => panic!("directories are not part of the workload"),
        }
    }

    #[test]
    fn workload_stays_in_the_population_and_follows_the_weights() {
        let config = WorkloadConfig::default();
        for target_selection in [TargetSelection::Uniform, TargetSelection::Zipfian] {
            let config = WorkloadConfig {
                target_selection,
                ..config.clone()
            };
            let mut generator =
                WorkloadGenerator::new(&config, 0.99, POPULATION, 0, 1, StdRng::seed_from_u64(9))
                    .unwrap();
            let recorder = Arc::new(RecordingDispatcher::new(4));
            let dispatcher: Arc<dyn OperationDispatcher> = recorder.clone();
            assert_eq!(generator.generate(500, &dispatcher).unwrap(), 500);
            let operations = recorder.operations();
            assert_eq!(operations.len(), 500);

            let mut counts: HashMap<WorkloadOperation, u64> = HashMap::new();
            for (sequence, operation) in (1u64..).zip(operations) {
                *counts.entry(kind_of(&operation)).or_default() += 1;
                match operation {
                    Operation::CreateFile { id, parent_id } => {
                        assert_eq!(id, POPULATION.files + sequence);
                        assert!((1..=POPULATION.directories).contains(&parent_id));
                    }
                    Operation::ListDir { dir_id } => {
                        assert!((1..=POPULATION.directories).contains(&dir_id))
                    }
                    Operation::Move {
                        file_id,
                        target_dir_id,
                    } => {
                        assert!((1..=POPULATION.files).contains(&file_id));
                        assert!((1..=POPULATION.directories).contains(&target_dir_id));
                    }
                    Operation::Delete { file_id }
                    | Operation::Open { file_id }
                    | Operation::ListFile { file_id }
                    | Operation::Rename { file_id } => {
                        assert!((1..=POPULATION.files).contains(&file_id))
                    }
                    Operation::CreateDir { .. } => unreachable!(),
                }
            }

            let weights = config.weights.as_array();
            let total: f64 = weights.iter().sum();
            for (kind, weight) in WorkloadOperation::ALL.into_iter().zip(weights) {
                let expected = 500.0 * weight / total;
                let observed = *counts.get(&kind).unwrap_or(&0) as f64;
                // five standard deviations of a binomial count
                let tolerance = 5.0 * (500.0 * (weight / total) * (1.0 - weight / total)).sqrt();
                assert!(
                    (observed - expected).abs() <= tolerance,
                    "{kind:?}: observed {observed}, expected {expected}"
                );
            }
        }
    }

    #[test]
    fn without_files_only_directory_operations_are_generated() {
        let mut generator = WorkloadGenerator::new(
            &WorkloadConfig::default(),
            0.99,
            Population {
                directories: 5,
                files: 0,
            },
            0,
            1,
            StdRng::seed_from_u64(3),
        )
        .unwrap();
        for sequence in 1..=200 {
            match generator.next_operation(sequence) {
                Operation::CreateFile { id, .. } => assert_eq!(id, sequence),
                Operation::ListDir { dir_id } => assert!((1..=5).contains(&dir_id)),
                other => panic!("operation {other:?} needs a file"),
            }
        }
    }

    #[test]
    fn an_empty_namespace_has_no_workload() {
        let result = WorkloadGenerator::new(
            &WorkloadConfig::default(),
            0.99,
            Population {
                directories: 0,
                files: 0,
            },
            0,
            1,
            StdRng::seed_from_u64(3),
        );
        assert!(matches!(result, Err(MasterError::EmptyNamespace)));

        let only_opens = WorkloadConfig {
            weights: OperationWeights {
                create: 0.0,
                delete: 0.0,
                open: 1.0,
                list_dir: 0.0,
                list_file: 0.0,
                rename: 0.0,
                move_file: 0.0,
            },
            target_selection: TargetSelection::Uniform,
        };
        let result = WorkloadGenerator::new(
            &only_opens,
            0.99,
            Population {
                directories: 3,
                files: 0,
            },
            0,
            1,
            StdRng::seed_from_u64(3),
        );
        assert!(matches!(result, Err(MasterError::EmptyNamespace)));
    }

    #[test]
    fn masters_split_the_sequence() {
        let dispatcher = Arc::new(RecordingDispatcher::new(2));
        let shared: Arc<dyn OperationDispatcher> = dispatcher.clone();
        let mut total = 0;
        for lane in 0..3 {
            let only_creates = WorkloadConfig {
                weights: OperationWeights {
                    create: 1.0,
                    delete: 0.0,
                    open: 0.0,
                    list_dir: 0.0,
                    list_file: 0.0,
                    rename: 0.0,
                    move_file: 0.0,
                },
                target_selection: TargetSelection::Uniform,
            };
            let mut generator = WorkloadGenerator::new(
                &only_creates,
                0.99,
                POPULATION,
                lane,
                3,
                StdRng::seed_from_u64(lane),
            )
            .unwrap();
            total += generator.generate(100, &shared).unwrap();
        }
        assert_eq!(total, 100);
        let mut ids: Vec<u64> = dispatcher
            .operations()
            .into_iter()
            .map(|operation| match operation {
                Operation::CreateFile { id, .. } => id,
                other => panic!("unexpected operation {other:?}"),
            })
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (201..=300).collect::<Vec<_>>());
    }
}

use std::{fmt, time::Duration};

use figment::{
    Figment,
    providers::{Format, Serialized, Yaml},
};
use fsclient::SimulatedFsConfig;
use node::NodeConfig;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryStrategyKind {
    #[default]
    Uniform,
    Preferential,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileStrategyKind {
    #[default]
    Zipfian,
    Uniform,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TargetSelection {
    #[default]
    Uniform,
    Zipfian,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct OperationWeights {
    pub create: f64,
    pub delete: f64,
    pub open: f64,
    pub list_dir: f64,
    pub list_file: f64,
    pub rename: f64,
    #[serde(rename = "move")]
    pub move_file: f64,
}

impl Default for OperationWeights {
    fn default() -> Self {
        Self {
            create: 10.0,
            delete: 5.0,
            open: 40.0,
            list_dir: 15.0,
            list_file: 15.0,
            rename: 10.0,
            move_file: 5.0,
        }
    }
}

impl OperationWeights {
    pub fn as_array(&self) -> [f64; 7] {
        [
            self.create,
            self.delete,
            self.open,
            self.list_dir,
            self.list_file,
            self.rename,
            self.move_file,
        ]
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct WorkloadConfig {
    #[serde(default)]
    pub weights: OperationWeights,
    #[serde(default)]
    pub target_selection: TargetSelection,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    pub id: String,
    // concurrent master tasks, each owning one creation lane
    pub masters: usize,
    pub nodes: usize,
    pub dirs: u64,
    pub files: u64,
    pub operations: u64,
    pub threads: usize,
    pub working_directory: String,
    pub directory_strategy: DirectoryStrategyKind,
    pub file_strategy: FileStrategyKind,
    pub zipf_exponent: f64,
    #[serde(default)]
    pub workload: WorkloadConfig,
    // fixes every random choice of the run when set
    pub seed: Option<u64>,
    pub phase_pause_ms: u64,
    pub broadcast_timeout_ms: u64,
    pub slow_operation_ms: u64,
    pub simulated_latency_us: u64,
    pub simulated_jitter_us: u64,
    pub log_level: String,
    pub log_base: String,
    pub apm_endpoint: Option<String>,
    pub report_file: Option<String>,
    pub per_node_report: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            id: "master".to_string(),
            masters: 1,
            nodes: 4,
            dirs: 1000,
            files: 5000,
            operations: 10_000,
            threads: 100,
            working_directory: "/metabench".to_string(),
            directory_strategy: DirectoryStrategyKind::default(),
            file_strategy: FileStrategyKind::default(),
            zipf_exponent: 0.99,
            workload: WorkloadConfig::default(),
            seed: None,
            phase_pause_ms: 2500,
            broadcast_timeout_ms: 5000,
            slow_operation_ms: 10_000,
            simulated_latency_us: 0,
            simulated_jitter_us: 0,
            log_level: "info".to_string(),
            log_base: "./temp/metabench/".to_string(),
            apm_endpoint: None,
            report_file: None,
            per_node_report: false,
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    NoMasters,
    NoNodes,
    NoThreads,
    // the root always comes with its first child
    SingleDirectory,
    // files and workload operations are placed in generated directories
    EmptyNamespace,
    InvalidZipfExponent(f64),
    InvalidWeight(&'static str, f64),
    NoWeightedOperation,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMasters => write!(f, "at least one master is required"),
            Self::NoNodes => write!(f, "at least one node is required"),
            Self::NoThreads => write!(f, "node worker pools need at least one thread"),
            Self::SingleDirectory => write!(f, "dirs must be 0 or at least 2"),
            Self::EmptyNamespace => write!(f, "files and operations need generated directories"),
            Self::InvalidZipfExponent(exponent) => {
                write!(f, "zipf_exponent must be finite and not negative, got {exponent}")
            }
            Self::InvalidWeight(name, weight) => {
                write!(f, "weight of {name} must be finite and not negative, got {weight}")
            }
            Self::NoWeightedOperation => write!(f, "at least one workload weight must be positive"),
        }
    }
}

impl std::error::Error for ConfigError {}

const WEIGHT_NAMES: [&str; 7] = [
    "create",
    "delete",
    "open",
    "list_dir",
    "list_file",
    "rename",
    "move",
];

impl Config {
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .extract()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.masters == 0 {
            return Err(ConfigError::NoMasters);
        }
        if self.nodes == 0 {
            return Err(ConfigError::NoNodes);
        }
        if self.threads == 0 {
            return Err(ConfigError::NoThreads);
        }
        if self.dirs == 1 {
            return Err(ConfigError::SingleDirectory);
        }
        if self.dirs == 0 && (self.files > 0 || self.operations > 0) {
            return Err(ConfigError::EmptyNamespace);
        }
        if !self.zipf_exponent.is_finite() || self.zipf_exponent < 0.0 {
            return Err(ConfigError::InvalidZipfExponent(self.zipf_exponent));
        }
        let weights = self.workload.weights.as_array();
        for (name, weight) in WEIGHT_NAMES.into_iter().zip(weights) {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::InvalidWeight(name, weight));
            }
        }
        if self.operations > 0 && weights.iter().all(|weight| *weight == 0.0) {
            return Err(ConfigError::NoWeightedOperation);
        }
        Ok(())
    }

    pub fn node_config(&self) -> NodeConfig {
        NodeConfig {
            threads: self.threads,
            slow_operation_ms: self.slow_operation_ms,
            ..NodeConfig::default()
        }
    }

    pub fn simulated_fs_config(&self) -> SimulatedFsConfig {
        SimulatedFsConfig {
            latency_us: self.simulated_latency_us,
            latency_jitter_us: self.simulated_jitter_us,
        }
    }

    pub fn phase_pause(&self) -> Duration {
        Duration::from_millis(self.phase_pause_ms)
    }

    pub fn broadcast_timeout(&self) -> Duration {
        Duration::from_millis(self.broadcast_timeout_ms)
    }
}

pub static CONFIG: Lazy<Config> = Lazy::new(|| {
    let env = std::env::var("ENV").unwrap_or_else(|_| "default".to_owned());
    let config_file_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| format!("./master/config/{}.yaml", env));
    Config::from_file(&config_file_path).unwrap()
});

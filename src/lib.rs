
pub mod data;
pub mod error;
pub mod io;
pub mod mining;
pub mod parallel;
pub mod stats;

pub use data::{Item, Tid, Quantity, Count, Posting, Transaction, UncertainDatabase, ProfitTable};
pub use data::{DataGenerator, GeneratorConfig};
pub use error::MineError;
pub use mining::{MinerConfig, MiningEngine, MiningOutcome, MinedItemset};
pub use parallel::{TopKAccumulator, CancelToken};
pub use stats::{MiningStats, StatsSnapshot};

/// Used as intermediate representation for itemsets
pub type Itemvec = Vec<Item>;

/// Tolerance for floating point comparisons of utilities and probabilities
pub const EPSILON: f64 = 1e-10;
/// Log probabilities at or below this value are treated as vanished
pub const LOG_EPSILON: f64 = -700.0;
/// Bound on slot replacement attempts in the top-k accumulator
pub const MAX_CAS_RETRIES: usize = 100;
/// Minimum collection size before the scheduler forks work
pub const PARALLEL_THRESHOLD: usize = 30;
/// Slices at most this long are processed without further splitting
pub const TASK_GRANULARITY: usize = 7;

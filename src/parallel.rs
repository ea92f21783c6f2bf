
mod scheduler;
mod topk;

pub use scheduler::{CancelToken, MiningScheduler};
pub use topk::{TopKAccumulator, TopKEntry};

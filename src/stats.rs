
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Shared counters written from every worker. All increments are relaxed;
/// individual counters are monotone but not mutually consistent mid-run.
#[derive( Debug, Default )]
pub struct MiningStats {
	candidates_generated: AtomicU64,
	candidates_pruned: AtomicU64,
	utility_lists_created: AtomicU64,
	rtwu_pruned: AtomicU64,
	eu_pruned: AtomicU64,
	ep_pruned: AtomicU64,
	branch_pruned: AtomicU64,
	bulk_branch_pruned: AtomicU64,
	execution_time_ms: AtomicU64,
}

impl MiningStats {

	pub fn record_candidate_generated( &self ) {
		self.candidates_generated.fetch_add( 1, Ordering::Relaxed );
	}

	pub fn record_candidates_pruned( &self, count: u64 ) {
		self.candidates_pruned.fetch_add( count, Ordering::Relaxed );
	}

	pub fn record_utility_list_created( &self ) {
		self.utility_lists_created.fetch_add( 1, Ordering::Relaxed );
	}

	pub fn record_rtwu_pruned( &self ) {
		self.rtwu_pruned.fetch_add( 1, Ordering::Relaxed );
	}

	pub fn record_eu_pruned( &self ) {
		self.eu_pruned.fetch_add( 1, Ordering::Relaxed );
	}

	pub fn record_ep_pruned( &self ) {
		self.ep_pruned.fetch_add( 1, Ordering::Relaxed );
	}

	pub fn record_branch_pruned( &self ) {
		self.branch_pruned.fetch_add( 1, Ordering::Relaxed );
	}

	pub fn record_bulk_branch_pruned( &self ) {
		self.bulk_branch_pruned.fetch_add( 1, Ordering::Relaxed );
	}

	pub fn record_execution_time( &self, elapsed: Duration ) {
		self.execution_time_ms.store( elapsed.as_millis() as u64, Ordering::Relaxed );
	}

	pub fn candidates_generated( &self ) -> u64 {
		self.candidates_generated.load( Ordering::Relaxed )
	}

	pub fn candidates_pruned( &self ) -> u64 {
		self.candidates_pruned.load( Ordering::Relaxed )
	}

	pub fn utility_lists_created( &self ) -> u64 {
		self.utility_lists_created.load( Ordering::Relaxed )
	}

	pub fn rtwu_pruned( &self ) -> u64 {
		self.rtwu_pruned.load( Ordering::Relaxed )
	}

	pub fn eu_pruned( &self ) -> u64 {
		self.eu_pruned.load( Ordering::Relaxed )
	}

	pub fn ep_pruned( &self ) -> u64 {
		self.ep_pruned.load( Ordering::Relaxed )
	}

	pub fn branch_pruned( &self ) -> u64 {
		self.branch_pruned.load( Ordering::Relaxed )
	}

	pub fn bulk_branch_pruned( &self ) -> u64 {
		self.bulk_branch_pruned.load( Ordering::Relaxed )
	}

	pub fn execution_time_ms( &self ) -> u64 {
		self.execution_time_ms.load( Ordering::Relaxed )
	}

	/// Share of generated candidates that some rule discarded.
	pub fn pruning_effectiveness( &self ) -> f64 {
		let generated = self.candidates_generated();
		if generated == 0 {
			0.0
		} else {
			self.candidates_pruned() as f64 / generated as f64
		}
	}
}

/// Scoped accounting of utility list element buffers, the structure that
/// dominates the run's footprint. Allocations and releases must pair up.
#[derive( Debug, Default )]
pub struct MemoryTracker {
	live: AtomicU64,
	peak: AtomicU64,
}

impl MemoryTracker {

	pub fn record_alloc( &self, bytes: u64 ) {
		let live = self.live.fetch_add( bytes, Ordering::Relaxed ) + bytes;
		self.peak.fetch_max( live, Ordering::Relaxed );
	}

	pub fn record_free( &self, bytes: u64 ) {
		self.live.fetch_sub( bytes, Ordering::Relaxed );
	}

	pub fn live_bytes( &self ) -> u64 {
		self.live.load( Ordering::Relaxed )
	}

	pub fn peak_bytes( &self ) -> u64 {
		self.peak.load( Ordering::Relaxed )
	}
}

/// Read-only view over a finished run, suitable for export.
#[derive( Debug, Clone, Serialize )]
pub struct StatsSnapshot {
	pub candidates_generated: u64,
	pub candidates_pruned: u64,
	pub utility_lists_created: u64,
	pub rtwu_pruned: u64,
	pub eu_pruned: u64,
	pub ep_pruned: u64,
	pub branch_pruned: u64,
	pub bulk_branch_pruned: u64,
	pub pruning_effectiveness: f64,
	pub execution_time_ms: u64,
	pub peak_memory_bytes: u64,
	pub successful_updates: u64,
	pub cas_retries: u64,
	pub cas_efficiency: f64,
	pub tasks_submitted: u64,
	pub tasks_completed: u64,
}

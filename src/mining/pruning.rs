
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::EPSILON;
use crate::stats::MiningStats;

/// How many candidates go by between recomputations of the adaptive factor.
const ADAPTATION_INTERVAL: u64 = 4096;

/// All pruning decisions of the search, sharing one statistics block.
/// Every rule is an upper bound argument: a branch is only cut when no
/// itemset inside it can still reach the threshold.
pub(crate) struct Pruner {
	min_prob: f64,
	adaptive: AdaptiveFactor,
}

impl Pruner {

	pub fn new( min_prob: f64, adaptive_rtwu: bool ) -> Pruner {
		Pruner { min_prob, adaptive: AdaptiveFactor::new( adaptive_rtwu ) }
	}

	pub fn should_prune_rtwu( &self, rtwu: f64, threshold: f64, stats: &MiningStats ) -> bool {
		if rtwu < self.adaptive.factor() * threshold - EPSILON {
			stats.record_rtwu_pruned();
			true
		} else {
			false
		}
	}

	pub fn should_prune_exist_prob( &self, exist_prob: f64, stats: &MiningStats ) -> bool {
		if exist_prob < self.min_prob - EPSILON {
			stats.record_ep_pruned();
			stats.record_candidates_pruned( 1 );
			true
		} else {
			false
		}
	}

	pub fn should_prune_upper_bound( &self, sum_eu: f64, sum_remaining: f64, threshold: f64, stats: &MiningStats ) -> bool {
		if sum_eu + sum_remaining < threshold - EPSILON {
			stats.record_eu_pruned();
			stats.record_candidates_pruned( 1 );
			true
		} else {
			false
		}
	}

	/// Cuts a whole extension front at once: no join of the prefix with any of
	/// the extensions can have rtwu above min(prefix, weakest extension).
	pub fn should_bulk_prune(
		&self,
		prefix_rtwu: f64,
		min_extension_rtwu: f64,
		extension_count: usize,
		threshold: f64,
		stats: &MiningStats,
	) -> bool {
		let bound = prefix_rtwu.min( min_extension_rtwu );
		if bound < threshold - EPSILON {
			stats.record_bulk_branch_pruned();
			stats.record_candidates_pruned( extension_count as u64 );
			true
		} else {
			false
		}
	}

	pub fn qualifies_for_topk( &self, sum_eu: f64, exist_prob: f64, threshold: f64 ) -> bool {
		sum_eu >= threshold - EPSILON && exist_prob >= self.min_prob - EPSILON
	}

	/// Periodic recalibration hook, called once per generated candidate.
	pub fn observe_candidate( &self, stats: &MiningStats ) {
		self.adaptive.maybe_adapt( stats );
	}

	#[cfg(test)]
	fn rtwu_factor( &self ) -> f64 {
		self.adaptive.factor()
	}
}

/// Optional multiplier on the rtwu threshold test. Off by default: a factor
/// above one trades exactness for pruning power, so the baseline stays at 1.0.
struct AdaptiveFactor {
	enabled: bool,
	factor_bits: AtomicU64,
	adapted_at: AtomicU64,
}

impl AdaptiveFactor {

	fn new( enabled: bool ) -> AdaptiveFactor {
		AdaptiveFactor {
			enabled,
			factor_bits: AtomicU64::new( 1.0_f64.to_bits() ),
			adapted_at: AtomicU64::new( 0 ),
		}
	}

	fn factor( &self ) -> f64 {
		if self.enabled {
			f64::from_bits( self.factor_bits.load( Ordering::Relaxed ))
		} else {
			1.0
		}
	}

	fn maybe_adapt( &self, stats: &MiningStats ) {
		if !self.enabled {
			return;
		}
		let generated = stats.candidates_generated();
		let last = self.adapted_at.load( Ordering::Relaxed );
		if generated < last + ADAPTATION_INTERVAL {
			return;
		}
		// racing recalibrations are harmless, only one wins the interval
		if self.adapted_at.compare_exchange( last, generated, Ordering::Relaxed, Ordering::Relaxed ).is_err() {
			return;
		}

		let prune_rate = stats.pruning_effectiveness();
		let current = f64::from_bits( self.factor_bits.load( Ordering::Relaxed ));
		let next = if prune_rate < 0.5 {
			(current * 1.1).min( 2.0 )
		} else if prune_rate > 0.9 {
			(current * 0.95).max( 0.8 )
		} else {
			current
		};
		if next != current {
			self.factor_bits.store( next.to_bits(), Ordering::Relaxed );
			debug!( "adaptive rtwu factor {current:.3} -> {next:.3} at prune rate {prune_rate:.2}" );
		}
	}
}

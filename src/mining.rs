
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use crate::{Itemvec, ProfitTable, UncertainDatabase};
use crate::error::MineError;
use crate::parallel::{CancelToken, MiningScheduler, TopKAccumulator};
use crate::stats::{MemoryTracker, MiningStats, StatsSnapshot};

pub(crate) mod builder;
pub(crate) mod join;
pub(crate) mod pruning;
pub(crate) mod search;
pub(crate) mod utility_list;

use builder::build_single_item_lists;
use pruning::Pruner;
use search::SearchContext;

/// Tuning knobs of a mining run.
#[derive( Debug, Clone )]
pub struct MinerConfig {
	/// How many itemsets to return
	pub k: usize,
	/// Floor on the existential probability of returned itemsets
	pub min_prob: f64,
	/// Worker threads; defaults to the machine's parallelism
	pub threads: Option<usize>,
	/// Turns the worker pool off entirely when false
	pub parallel: bool,
	/// Opt-in heuristic that scales the rtwu test with observed prune rates
	pub adaptive_rtwu: bool,
}

impl MinerConfig {

	pub fn new( k: usize, min_prob: f64 ) -> MinerConfig {
		MinerConfig {
			k,
			min_prob,
			threads: None,
			parallel: true,
			adaptive_rtwu: false,
		}
	}

	pub fn serial( k: usize, min_prob: f64 ) -> MinerConfig {
		MinerConfig { parallel: false, ..MinerConfig::new( k, min_prob ) }
	}
}

/// One itemset of the final ranking.
#[derive( Debug, Clone, PartialEq, Serialize )]
pub struct MinedItemset {
	pub items: Itemvec,
	pub expected_utility: f64,
	pub probability: f64,
	pub support: usize,
}

/// What a finished run hands back: the ranking plus its statistics.
#[derive( Debug, Clone, Serialize )]
pub struct MiningOutcome {
	pub itemsets: Vec<MinedItemset>,
	pub statistics: StatsSnapshot,
	/// True when a cancel signal cut the enumeration short
	pub cancelled: bool,
}

/// Mines the top-k highest expected utility itemsets from an uncertain
/// database. The engine owns the profit table and scheduler; everything a
/// single run touches is created in `mine` and released when it returns.
pub struct MiningEngine {
	profits: ProfitTable,
	config: MinerConfig,
	scheduler: Option<MiningScheduler>,
}

impl MiningEngine {

	pub fn new( profits: ProfitTable, config: MinerConfig ) -> Result<MiningEngine, MineError> {
		if config.k < 1 {
			return Err( MineError::invalid( "k must be at least 1" ));
		}
		if !config.min_prob.is_finite() || config.min_prob < 0.0 || config.min_prob > 1.0 {
			return Err( MineError::invalid( format!( "minimum probability {} outside [0, 1]", config.min_prob )));
		}
		let scheduler = if config.parallel {
			Some( MiningScheduler::new( config.threads )? )
		} else {
			None
		};
		Ok( MiningEngine { profits, config, scheduler } )
	}

	pub fn mine( &self, database: &UncertainDatabase ) -> Result<MiningOutcome, MineError> {
		self.mine_with_cancel( database, &CancelToken::new() )
	}

	pub fn mine_with_cancel( &self, database: &UncertainDatabase, cancel: &CancelToken ) -> Result<MiningOutcome, MineError> {
		let started = Instant::now();
		let stats = MiningStats::default();
		let memory = MemoryTracker::default();
		let topk = TopKAccumulator::new( self.config.k );
		let pruner = Pruner::new( self.config.min_prob, self.config.adaptive_rtwu );

		info!( "mining top {} itemsets from {} transactions", self.config.k, database.len() );
		let built = build_single_item_lists( database, &self.profits, self.config.min_prob, &stats, &memory );
		debug!( "{} items ranked, {} single item lists built", built.rtwu.len(), built.lists.len() );

		// single items compete for the top-k before any extension is tried
		for list in &built.lists {
			if pruner.qualifies_for_topk( list.sum_eu(), list.exist_prob(), topk.threshold() ) {
				topk.try_add( list.itemset(), list.sum_eu(), list.exist_prob(), list.support() );
			}
		}

		let ctx = SearchContext {
			topk: &topk,
			stats: &stats,
			pruner: &pruner,
			memory: &memory,
			scheduler: self.scheduler.as_ref(),
			cancel,
		};
		match &self.scheduler {
			Some( scheduler ) => scheduler.run_prefixes( &ctx, &built.lists ),
			None => search::mine_prefixes( &ctx, &built.lists ),
		}

		stats.record_execution_time( started.elapsed() );
		let itemsets: Vec<MinedItemset> = topk.snapshot().into_iter()
			.map( |entry| MinedItemset {
				items: entry.items(),
				expected_utility: entry.expected_utility(),
				probability: entry.probability(),
				support: entry.support(),
			})
			.collect();
		debug!( "returning {} itemsets after {} candidates", itemsets.len(), stats.candidates_generated() );

		let statistics = self.snapshot_statistics( &stats, &memory, &topk );
		Ok( MiningOutcome { itemsets, statistics, cancelled: cancel.is_cancelled() } )
	}

	fn snapshot_statistics( &self, stats: &MiningStats, memory: &MemoryTracker, topk: &TopKAccumulator ) -> StatsSnapshot {
		StatsSnapshot {
			candidates_generated: stats.candidates_generated(),
			candidates_pruned: stats.candidates_pruned(),
			utility_lists_created: stats.utility_lists_created(),
			rtwu_pruned: stats.rtwu_pruned(),
			eu_pruned: stats.eu_pruned(),
			ep_pruned: stats.ep_pruned(),
			branch_pruned: stats.branch_pruned(),
			bulk_branch_pruned: stats.bulk_branch_pruned(),
			pruning_effectiveness: stats.pruning_effectiveness(),
			execution_time_ms: stats.execution_time_ms(),
			peak_memory_bytes: memory.peak_bytes(),
			successful_updates: topk.successful_updates(),
			cas_retries: topk.cas_retries(),
			cas_efficiency: topk.cas_efficiency(),
			tasks_submitted: self.scheduler.as_ref().map_or( 0, |scheduler| scheduler.tasks_submitted() ),
			tasks_completed: self.scheduler.as_ref().map_or( 0, |scheduler| scheduler.tasks_completed() ),
		}
	}
}

#[cfg(test)]
mod test {

	use super::*;
	use crate::{EPSILON, Posting, Transaction};

	macro_rules! assert_approx {
		( $left:expr, $right:expr ) => {
			assert!( ($left - $right).abs() < EPSILON, "{} != {}", $left, $right );
		};
	}

	fn transaction( tid: usize, postings: Vec<(usize, u32, f64)> ) -> Transaction {
		let postings = postings.into_iter()
			.map( |(item, quantity, probability)| Posting::new( item, quantity, probability ))
			.collect();
		Transaction::new( tid, postings ).unwrap()
	}

	fn mine_serial( profits: Vec<(usize, f64)>, transactions: Vec<Transaction>, k: usize, min_prob: f64 ) -> MiningOutcome {
		let profits = ProfitTable::from_pairs( profits ).unwrap();
		let database = UncertainDatabase::from_transactions( transactions ).unwrap();
		let engine = MiningEngine::new( profits, MinerConfig::serial( k, min_prob )).unwrap();
		engine.mine( &database ).unwrap()
	}

	#[test]
	fn test_config_validation() {
		let profits = ProfitTable::from_pairs( vec!( (1, 1.0) )).unwrap();
		assert!( MiningEngine::new( profits.clone(), MinerConfig::serial( 0, 0.5 )).is_err() );
		assert!( MiningEngine::new( profits.clone(), MinerConfig::serial( 1, -0.1 )).is_err() );
		assert!( MiningEngine::new( profits.clone(), MinerConfig::serial( 1, 1.1 )).is_err() );
		assert!( MiningEngine::new( profits, MinerConfig::serial( 1, 1.0 )).is_ok() );
	}

	#[test]
	fn test_pair_beats_both_singles() {
		// both items share one transaction; the pair nets utility 50 at joint
		// probability 0.72, beating either single item alone
		let outcome = mine_serial(
			vec!( (1, 5.0), (2, 10.0) ),
			vec!( transaction( 1, vec!( (1, 2, 0.9), (2, 4, 0.8) ))),
			1,
			0.5,
		);

		assert_eq!( outcome.itemsets.len(), 1 );
		let best = &outcome.itemsets[0];
		assert_eq!( best.items, vec!( 1, 2 ));
		assert_approx!( best.expected_utility, 50.0 * 0.72 );
		assert_approx!( best.probability, 0.72 );
		assert_eq!( best.support, 1 );
	}

	#[test]
	fn test_negative_profit_mix() {
		let outcome = mine_serial(
			vec!( (1, 5.0), (2, -3.0), (3, 10.0) ),
			vec!( transaction( 1, vec!( (1, 2, 0.8), (2, 3, 0.9), (3, 1, 0.7) ))),
			3,
			0.3,
		);

		// {1,3} = 20 * 0.56, {1} = 10 * 0.8, {3} = 10 * 0.7; the full triple
		// nets 11 * 0.504 = 5.544, accepted while the ranking was short but
		// displaced before the end
		assert_eq!( outcome.itemsets.len(), 3 );
		assert_eq!( outcome.itemsets[0].items, vec!( 1, 3 ));
		assert_approx!( outcome.itemsets[0].expected_utility, 11.2 );
		assert_eq!( outcome.itemsets[1].items, vec!( 1 ));
		assert_approx!( outcome.itemsets[1].expected_utility, 8.0 );
		assert_eq!( outcome.itemsets[2].items, vec!( 3 ));
		assert_approx!( outcome.itemsets[2].expected_utility, 7.0 );
	}

	#[test]
	fn test_triple_expected_utility() {
		// same data, wide enough k for the triple to stay resident
		let outcome = mine_serial(
			vec!( (1, 5.0), (2, -3.0), (3, 10.0) ),
			vec!( transaction( 1, vec!( (1, 2, 0.8), (2, 3, 0.9), (3, 1, 0.7) ))),
			10,
			0.3,
		);

		let triple = outcome.itemsets.iter()
			.find( |itemset| itemset.items == vec!( 1, 2, 3 ))
			.expect( "triple qualifies under the wide k" );
		assert_approx!( triple.expected_utility, 5.544 );
		assert_approx!( triple.probability, 0.504 );
	}

	#[test]
	fn test_all_negative_profits_yield_nothing() {
		let outcome = mine_serial(
			vec!( (1, -5.0), (2, -1.0) ),
			vec!( transaction( 1, vec!( (1, 2, 0.9), (2, 4, 0.8) ))),
			5,
			0.0,
		);
		assert!( outcome.itemsets.is_empty() );
	}

	#[test]
	fn test_min_prob_one_requires_certainty() {
		let outcome = mine_serial(
			vec!( (1, 5.0), (2, 5.0) ),
			vec!(
				transaction( 1, vec!( (1, 1, 1.0), (2, 1, 0.9) )),
				transaction( 2, vec!( (1, 1, 1.0) )),
			),
			5,
			1.0,
		);

		// only {1} occurs with certainty somewhere
		assert_eq!( outcome.itemsets.len(), 1 );
		assert_eq!( outcome.itemsets[0].items, vec!( 1 ));
		assert_eq!( outcome.itemsets[0].support, 2 );
	}

	#[test]
	fn test_returned_sets_are_unique_and_sorted() {
		let outcome = mine_serial(
			vec!( (1, 4.0), (2, 3.0), (3, 2.0), (4, 6.0) ),
			vec!(
				transaction( 1, vec!( (1, 1, 0.9), (2, 2, 0.8), (3, 1, 0.9) )),
				transaction( 2, vec!( (2, 1, 0.7), (3, 2, 0.6), (4, 1, 0.9) )),
				transaction( 3, vec!( (1, 2, 0.5), (4, 2, 0.95) )),
			),
			6,
			0.2,
		);

		assert!( outcome.itemsets.len() <= 6 );
		for pair in outcome.itemsets.windows( 2 ) {
			assert!( pair[0].expected_utility >= pair[1].expected_utility - EPSILON );
			assert!( pair[0].items != pair[1].items );
		}
		for itemset in &outcome.itemsets {
			assert!( itemset.probability >= 0.2 - EPSILON );
			assert!( itemset.support >= 1 );
		}
	}

	#[test]
	fn test_cancelled_run_terminates_cleanly() {
		let profits = ProfitTable::from_pairs( vec!( (1, 5.0), (2, 3.0) )).unwrap();
		let database = UncertainDatabase::from_transactions( vec!(
			transaction( 1, vec!( (1, 1, 0.9), (2, 1, 0.8) )),
		)).unwrap();
		let engine = MiningEngine::new( profits, MinerConfig::serial( 2, 0.0 )).unwrap();

		let cancel = CancelToken::new();
		cancel.cancel();
		let outcome = engine.mine_with_cancel( &database, &cancel ).unwrap();
		assert!( outcome.cancelled );
		// single items were already offered before the enumeration began
		assert!( outcome.itemsets.len() <= 2 );
	}
}

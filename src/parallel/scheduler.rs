
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::{debug, error, info};

use crate::{PARALLEL_THRESHOLD, TASK_GRANULARITY};
use crate::error::MineError;
use crate::mining::search::{self, SearchContext};
use crate::mining::utility_list::UtilityList;

/// Cooperative stop signal. Tasks that observe it return at the next
/// prefix or extension boundary; whatever the top-k already holds stays valid.
#[derive( Debug, Clone, Default )]
pub struct CancelToken {
	flag: Arc<AtomicBool>,
}

impl CancelToken {

	pub fn new() -> CancelToken {
		CancelToken::default()
	}

	pub fn cancel( &self ) {
		self.flag.store( true, Ordering::Release );
	}

	pub fn is_cancelled( &self ) -> bool {
		self.flag.load( Ordering::Acquire )
	}
}

/// Work stealing driver over the prefix enumeration. Ranges split at their
/// midpoint down to a fixed granularity; extension fronts split the same way
/// once a search inside the pool grows wide enough.
pub struct MiningScheduler {
	pool: rayon::ThreadPool,
	parallelism: usize,
	tasks_submitted: AtomicU64,
	tasks_completed: AtomicU64,
}

impl MiningScheduler {

	pub fn new( threads: Option<usize> ) -> Result<MiningScheduler, MineError> {
		let parallelism = threads.unwrap_or_else( || {
			std::thread::available_parallelism().map( |count| count.get() ).unwrap_or( 1 )
		});
		let pool = rayon::ThreadPoolBuilder::new()
			.num_threads( parallelism )
			// recursion depth is bounded by the ranked item count; give deep
			// databases room before they meet the guard page
			.stack_size( 8 * 1024 * 1024 )
			.thread_name( |index| format!( "utilmine-worker-{index}" ))
			.build()
			.map_err( |err| MineError::ResourceExhaustion( err.to_string() ))?;
		info!( "scheduler ready with {parallelism} workers" );
		Ok( MiningScheduler {
			pool,
			parallelism,
			tasks_submitted: AtomicU64::new( 0 ),
			tasks_completed: AtomicU64::new( 0 ),
		})
	}

	pub fn parallelism( &self ) -> usize {
		self.parallelism
	}

	pub fn tasks_submitted( &self ) -> u64 {
		self.tasks_submitted.load( Ordering::Relaxed )
	}

	pub fn tasks_completed( &self ) -> u64 {
		self.tasks_completed.load( Ordering::Relaxed )
	}

	/// Runs the top level prefix enumeration, in parallel when the item count
	/// warrants it. A panicking worker demotes the run to the sequential
	/// driver; results gathered so far keep counting.
	pub(crate) fn run_prefixes( &self, ctx: &SearchContext, lists: &[UtilityList] ) {
		if lists.len() < PARALLEL_THRESHOLD {
			debug!( "{} prefixes, staying sequential", lists.len() );
			search::mine_prefixes( ctx, lists );
			return;
		}

		self.tasks_submitted.fetch_add( 1, Ordering::Relaxed );
		let outcome = panic::catch_unwind( AssertUnwindSafe( || {
			self.pool.install( || self.prefix_task( ctx, lists, 0, lists.len() ));
		}));
		if outcome.is_err() {
			error!( "worker panic during parallel mining, falling back to sequential" );
			search::mine_prefixes( ctx, lists );
		}
	}

	fn prefix_task( &self, ctx: &SearchContext, lists: &[UtilityList], lo: usize, hi: usize ) {
		if ctx.cancel.is_cancelled() {
			return;
		}
		let size = hi - lo;
		if size <= TASK_GRANULARITY {
			for index in lo .. hi {
				search::process_prefix( ctx, lists, index );
			}
			self.tasks_completed.fetch_add( 1, Ordering::Relaxed );
			return;
		}

		let mid = lo + size / 2;
		self.tasks_submitted.fetch_add( 2, Ordering::Relaxed );
		rayon::join(
			|| self.prefix_task( ctx, lists, lo, mid ),
			|| self.prefix_task( ctx, lists, mid, hi ),
		);
	}

	/// Splits one extension front across the pool. Only worthwhile for wide
	/// fronts, and only when the caller already runs on a pool thread.
	pub(crate) fn try_parallel_extensions(
		&self,
		ctx: &SearchContext,
		prefix: &UtilityList,
		extensions: &[&UtilityList],
	) -> bool {
		if extensions.len() < PARALLEL_THRESHOLD || self.pool.current_thread_index().is_none() {
			return false;
		}
		self.tasks_submitted.fetch_add( 1, Ordering::Relaxed );
		self.extension_task( ctx, prefix, extensions, 0, extensions.len() );
		true
	}

	fn extension_task(
		&self,
		ctx: &SearchContext,
		prefix: &UtilityList,
		extensions: &[&UtilityList],
		lo: usize,
		hi: usize,
	) {
		if ctx.cancel.is_cancelled() {
			return;
		}
		let size = hi - lo;

		// a subtree whose best possible rtwu misses the threshold dies whole,
		// before any split or join happens below it
		if size > 1 {
			let threshold = ctx.topk.threshold();
			let min_rtwu = extensions[lo .. hi].iter()
				.map( |extension| extension.rtwu() )
				.fold( f64::INFINITY, f64::min );
			if ctx.pruner.should_bulk_prune( prefix.rtwu(), min_rtwu, size, threshold, ctx.stats ) {
				self.tasks_completed.fetch_add( 1, Ordering::Relaxed );
				return;
			}
		}

		if size <= TASK_GRANULARITY {
			for index in lo .. hi {
				search::process_extension( ctx, prefix, extensions, index );
			}
			self.tasks_completed.fetch_add( 1, Ordering::Relaxed );
			return;
		}

		let mid = lo + size / 2;
		self.tasks_submitted.fetch_add( 2, Ordering::Relaxed );
		rayon::join(
			|| self.extension_task( ctx, prefix, extensions, lo, mid ),
			|| self.extension_task( ctx, prefix, extensions, mid, hi ),
		);
	}
}

#[cfg(test)]
mod test {

	use super::*;

	#[test]
	fn test_cancel_token() {
		let token = CancelToken::new();
		assert!( !token.is_cancelled() );
		let shared = token.clone();
		shared.cancel();
		assert!( token.is_cancelled() );
	}

	#[test]
	fn test_scheduler_reports_parallelism() {
		let scheduler = MiningScheduler::new( Some( 2 )).unwrap();
		assert_eq!( scheduler.parallelism(), 2 );
		assert_eq!( scheduler.tasks_submitted(), 0 );
	}
}

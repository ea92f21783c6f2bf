
use crate::EPSILON;
use crate::parallel::{CancelToken, MiningScheduler, TopKAccumulator};
use crate::stats::{MemoryTracker, MiningStats};
use super::join::join;
use super::pruning::Pruner;
use super::utility_list::UtilityList;

/// Everything a search task needs, shared read-only across workers.
/// Tasks are value typed and short lived; they never point at each other.
pub(crate) struct SearchContext<'a> {
	pub topk: &'a TopKAccumulator,
	pub stats: &'a MiningStats,
	pub pruner: &'a Pruner,
	pub memory: &'a MemoryTracker,
	pub scheduler: Option<&'a MiningScheduler>,
	pub cancel: &'a CancelToken,
}

/// Sequential top level loop: one prefix per ranked item.
pub(crate) fn mine_prefixes( ctx: &SearchContext, lists: &[UtilityList] ) {
	for index in 0 .. lists.len() {
		if ctx.cancel.is_cancelled() {
			return;
		}
		process_prefix( ctx, lists, index );
	}
}

/// Seeds the search below one single item prefix: collect the viable
/// extensions ranked after it and descend.
pub(crate) fn process_prefix( ctx: &SearchContext, lists: &[UtilityList], index: usize ) {
	let prefix = &lists[index];
	let threshold = ctx.topk.threshold();
	if prefix.rtwu() < threshold - EPSILON {
		ctx.stats.record_branch_pruned();
		return;
	}

	let mut extensions: Vec<&UtilityList> = Vec::with_capacity( lists.len() - index - 1 );
	for extension in &lists[index + 1 ..] {
		if extension.rtwu() < threshold - EPSILON {
			ctx.stats.record_rtwu_pruned();
		} else {
			extensions.push( extension );
		}
	}
	if !extensions.is_empty() {
		search( ctx, prefix, extensions );
	}
}

/// Depth first search below a prefix. Extensions are explored best first by
/// rtwu so the threshold climbs early and later branches die cheaply.
pub(crate) fn search( ctx: &SearchContext, prefix: &UtilityList, mut extensions: Vec<&UtilityList> ) {
	if extensions.is_empty() || ctx.cancel.is_cancelled() {
		return;
	}

	let threshold = ctx.topk.threshold();
	let min_extension_rtwu = extensions.iter()
		.map( |extension| extension.rtwu() )
		.fold( f64::INFINITY, f64::min );
	if ctx.pruner.should_bulk_prune( prefix.rtwu(), min_extension_rtwu, extensions.len(), threshold, ctx.stats ) {
		return;
	}

	extensions.sort_by( |left, right| right.rtwu().total_cmp( &left.rtwu() ));

	if let Some( scheduler ) = ctx.scheduler {
		if scheduler.try_parallel_extensions( ctx, prefix, &extensions ) {
			return;
		}
	}
	for index in 0 .. extensions.len() {
		process_extension( ctx, prefix, &extensions, index );
	}
}

/// One candidate: join the prefix with extensions[index], run it through the
/// pruning pipeline, offer it to the top-k and descend into its subtree.
pub(crate) fn process_extension( ctx: &SearchContext, prefix: &UtilityList, extensions: &[&UtilityList], index: usize ) {
	if ctx.cancel.is_cancelled() {
		return;
	}

	let extension = extensions[index];
	let threshold = ctx.topk.threshold();
	if ctx.pruner.should_prune_rtwu( extension.rtwu(), threshold, ctx.stats ) {
		ctx.stats.record_candidates_pruned( 1 );
		return;
	}

	let joined = match join( prefix, extension, threshold, ctx.stats ) {
		Some( joined ) => joined,
		None => return,
	};
	ctx.stats.record_utility_list_created();
	ctx.stats.record_candidate_generated();
	ctx.pruner.observe_candidate( ctx.stats );

	let footprint = joined.footprint_bytes();
	ctx.memory.record_alloc( footprint );

	let doomed = ctx.pruner.should_prune_exist_prob( joined.exist_prob(), ctx.stats )
		|| ctx.pruner.should_prune_upper_bound( joined.sum_eu(), joined.sum_remaining(), ctx.topk.threshold(), ctx.stats );
	if !doomed {
		if ctx.pruner.qualifies_for_topk( joined.sum_eu(), joined.exist_prob(), ctx.topk.threshold() ) {
			ctx.topk.try_add( joined.itemset(), joined.sum_eu(), joined.exist_prob(), joined.support() );
		}

		if index + 1 < extensions.len() {
			// re-filter the tail against the threshold as it stands now
			let fresh_threshold = ctx.topk.threshold();
			let mut tail: Vec<&UtilityList> = Vec::with_capacity( extensions.len() - index - 1 );
			for extension in extensions[index + 1 ..].iter().copied() {
				if extension.rtwu() < fresh_threshold - EPSILON {
					ctx.stats.record_rtwu_pruned();
				} else {
					tail.push( extension );
				}
			}
			if !tail.is_empty() {
				search( ctx, &joined, tail );
			}
		}
	}

	ctx.memory.record_free( footprint );
}

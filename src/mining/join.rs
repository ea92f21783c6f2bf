
use crate::{EPSILON, LOG_EPSILON, Item, Itemvec};
use crate::stats::MiningStats;
use super::utility_list::{Element, UtilityList};

/// Joins two utility lists that share a prefix into the list of the union
/// itemset. Returns None when the branch is not worth keeping: the combined
/// rtwu falls under the threshold, or no transaction carries both itemsets.
///
/// The merge always runs both element lists to exhaustion. Bailing out early
/// after a streak of tid misses can drop matches that hide in the tail.
pub(crate) fn join(
	prefix: &UtilityList,
	extension: &UtilityList,
	threshold: f64,
	stats: &MiningStats,
) -> Option<UtilityList> {
	let joined_rtwu = prefix.rtwu().min( extension.rtwu() );
	if joined_rtwu < threshold - EPSILON {
		stats.record_rtwu_pruned();
		return None;
	}

	let left = prefix.elements();
	let right = extension.elements();
	if left.is_empty() || right.is_empty() {
		return None;
	}

	let estimate = (left.len().min( right.len() ) / 3).clamp( 4, 1024 );
	let mut merged: Vec<Element> = Vec::with_capacity( estimate );

	let mut i = 0;
	let mut j = 0;
	while i < left.len() && j < right.len() {
		let a = &left[i];
		let b = &right[j];
		if a.tid == b.tid {
			let log_prob = a.log_prob + b.log_prob;
			// vanished joint probability, the element cannot contribute
			if log_prob > LOG_EPSILON {
				merged.push( Element::new(
					a.tid,
					a.utility + b.utility,
					a.remaining.min( b.remaining ),
					log_prob,
				));
			}
			i += 1;
			j += 1;
		} else if a.tid < b.tid {
			i += 1;
		} else {
			j += 1;
		}
	}

	if merged.is_empty() {
		return None;
	}
	if merged.len() <= estimate / 3 {
		merged.shrink_to_fit();
	}

	Some( UtilityList::new(
		merge_itemsets( prefix.itemset(), extension.itemset() ),
		joined_rtwu,
		merged,
	))
}

/// Union of two ascending item vectors, order preserved.
fn merge_itemsets( left: &[Item], right: &[Item] ) -> Itemvec {
	let mut union = Itemvec::with_capacity( left.len() + right.len() );
	let mut i = 0;
	let mut j = 0;
	while i < left.len() && j < right.len() {
		if left[i] == right[j] {
			union.push( left[i] );
			i += 1;
			j += 1;
		} else if left[i] < right[j] {
			union.push( left[i] );
			i += 1;
		} else {
			union.push( right[j] );
			j += 1;
		}
	}
	union.extend_from_slice( &left[i ..] );
	union.extend_from_slice( &right[j ..] );
	union
}

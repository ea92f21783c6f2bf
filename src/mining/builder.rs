
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::{EPSILON, LOG_EPSILON, Item, Transaction, UncertainDatabase, ProfitTable};
use crate::stats::{MiningStats, MemoryTracker};
use super::utility_list::{Element, UtilityList};

/// Output of the initialization phase: the rtwu table plus one utility list
/// per surviving item, ordered by ascending rank.
pub(crate) struct SingleItemLists {
	pub rtwu: FxHashMap<Item, f64>,
	pub lists: Vec<UtilityList>,
}

/// One item occurrence pulled out of a transaction, pre-sorted by rank.
struct RankedPosting {
	item: Item,
	rank: usize,
	utility: f64,
	positive_utility: f64,
	log_prob: f64,
}

/// Builds the single item utility lists in two database passes: one for rtwu
/// and ranking, one suffix-sum pass that fills every element in O(T) per
/// transaction. Items whose existence probability misses the floor are dropped.
pub(crate) fn build_single_item_lists(
	database: &UncertainDatabase,
	profits: &ProfitTable,
	min_prob: f64,
	stats: &MiningStats,
	memory: &MemoryTracker,
) -> SingleItemLists {
	let rtwu = calculate_rtwu( database, profits );
	let ranking = rank_items( &rtwu );
	debug!( "ranked {} items by rtwu", ranking.len() );

	let mut elements_per_item: FxHashMap<Item, Vec<Element>> = FxHashMap::default();
	for transaction in database {
		collect_transaction_elements( transaction, profits, &ranking, &mut elements_per_item );
	}

	// keep rank order so the search can extend positionally
	let mut lists = Vec::new();
	for (item, _rank) in ranking_in_order( &ranking ) {
		let elements = match elements_per_item.remove( &item ) {
			Some( elements ) if !elements.is_empty() => elements,
			_ => continue,
		};
		let list = UtilityList::new( vec!( item ), rtwu[&item], elements );
		if list.exist_prob() < min_prob - EPSILON {
			continue;
		}
		stats.record_utility_list_created();
		memory.record_alloc( list.footprint_bytes() );
		lists.push( list );
	}
	debug!( "{} single item lists survive the probability floor", lists.len() );

	SingleItemLists { rtwu, lists }
}

/// Single pass over the database: each transaction's positive utility total is
/// added to the rtwu of every item it may contain.
pub(crate) fn calculate_rtwu( database: &UncertainDatabase, profits: &ProfitTable ) -> FxHashMap<Item, f64> {
	let mut rtwu: FxHashMap<Item, f64> = FxHashMap::default();
	for transaction in database {
		let rtu: f64 = transaction.postings().iter()
			.filter_map( |posting| profits.get( posting.item )
				.map( |profit| profit.max( 0.0 ) * posting.quantity as f64 ))
			.sum();
		for posting in transaction.postings() {
			if posting.probability > 0.0 && profits.get( posting.item ).is_some() {
				*rtwu.entry( posting.item ).or_insert( 0.0 ) += rtu;
			}
		}
	}
	rtwu
}

/// Total order on items: ascending rtwu, ties broken by item id.
fn rank_items( rtwu: &FxHashMap<Item, f64> ) -> FxHashMap<Item, usize> {
	let mut items: Vec<Item> = rtwu.keys().copied().collect();
	items.sort_by( |left, right| rtwu[left].total_cmp( &rtwu[right] ).then( left.cmp( right )));
	items.into_iter().enumerate().map( |(rank, item)| (item, rank) ).collect()
}

fn ranking_in_order( ranking: &FxHashMap<Item, usize> ) -> Vec<(Item, usize)> {
	let mut pairs: Vec<(Item, usize)> = ranking.iter().map( |(item, rank)| (*item, *rank) ).collect();
	pairs.sort_by_key( |(_, rank)| *rank );
	pairs
}

/// Suffix-sum pass over one transaction. With items sorted by rank, the
/// remaining utility of position i is the sum of positive utilities strictly
/// after i, computed right to left in one sweep.
fn collect_transaction_elements(
	transaction: &Transaction,
	profits: &ProfitTable,
	ranking: &FxHashMap<Item, usize>,
	elements_per_item: &mut FxHashMap<Item, Vec<Element>>,
) {
	let mut ranked: Vec<RankedPosting> = transaction.postings().iter()
		.filter( |posting| posting.probability > 0.0 )
		.filter_map( |posting| {
			let profit = profits.get( posting.item )?;
			let rank = *ranking.get( &posting.item )?;
			Some( RankedPosting {
				item: posting.item,
				rank,
				utility: profit * posting.quantity as f64,
				positive_utility: profit.max( 0.0 ) * posting.quantity as f64,
				log_prob: posting.probability.ln(),
			})
		})
		.collect();
	if ranked.is_empty() {
		// nothing mineable in this transaction
		return;
	}
	ranked.sort_by_key( |posting| posting.rank );

	let mut suffix = vec!( 0.0; ranked.len() );
	for position in (0 .. ranked.len() - 1).rev() {
		suffix[position] = suffix[position + 1] + ranked[position + 1].positive_utility;
	}

	for (position, posting) in ranked.iter().enumerate() {
		if posting.log_prob > LOG_EPSILON {
			elements_per_item.entry( posting.item )
				.or_default()
				.push( Element::new( transaction.tid(), posting.utility, suffix[position], posting.log_prob ));
		}
	}
}


use std::fs;

use utilmine::*;
use utilmine::io::{read_database, read_profit_table};

const EPSILON: f64 = 1e-10;

fn generated_input( seed: u64 ) -> (ProfitTable, UncertainDatabase) {
	let config = GeneratorConfig {
		num_transactions: 300,
		num_items: 60,
		max_items_per_transaction: 8,
		negative_ratio: 0.2,
		zipf_exponent: Some( 1.1 ),
		..GeneratorConfig::default()
	};
	let mut generator = DataGenerator::new( config, seed );
	let profits = generator.generate_profits();
	let database = generator.generate_database();
	(profits, database)
}

fn mine( profits: &ProfitTable, database: &UncertainDatabase, config: MinerConfig ) -> MiningOutcome {
	let engine = MiningEngine::new( profits.clone(), config ).unwrap();
	engine.mine( database ).unwrap()
}

/// Itemsets keyed for set comparison, utilities rounded away from float noise.
fn result_set( outcome: &MiningOutcome ) -> Vec<(Vec<Item>, i64)> {
	let mut keyed: Vec<(Vec<Item>, i64)> = outcome.itemsets.iter()
		.map( |itemset| (itemset.items.clone(), (itemset.expected_utility / EPSILON).round() as i64) )
		.collect();
	keyed.sort();
	keyed
}

#[test]
fn serial_and_parallel_agree() {
	let (profits, database) = generated_input( 99 );

	let serial = mine( &profits, &database, MinerConfig::serial( 25, 0.2 ));
	let parallel = mine( &profits, &database, MinerConfig {
		threads: Some( 8 ),
		..MinerConfig::new( 25, 0.2 )
	});

	assert!( !serial.itemsets.is_empty() );
	assert_eq!( result_set( &serial ), result_set( &parallel ));
	assert!( serial.statistics.candidates_generated > 0 );
	assert!( parallel.statistics.candidates_generated > 0 );
}

#[test]
fn mining_is_deterministic_for_a_seed() {
	let (profits, database) = generated_input( 7 );
	let first = mine( &profits, &database, MinerConfig::serial( 15, 0.1 ));
	let second = mine( &profits, &database, MinerConfig::serial( 15, 0.1 ));

	assert_eq!( first.itemsets.len(), second.itemsets.len() );
	for (left, right) in first.itemsets.iter().zip( second.itemsets.iter() ) {
		assert_eq!( left.items, right.items );
		assert!( (left.expected_utility - right.expected_utility).abs() < EPSILON );
		assert!( (left.probability - right.probability).abs() < EPSILON );
	}
}

#[test]
fn smaller_k_returns_a_prefix() {
	let (profits, database) = generated_input( 21 );
	let wide = mine( &profits, &database, MinerConfig::serial( 20, 0.2 ));
	let narrow = mine( &profits, &database, MinerConfig::serial( 8, 0.2 ));

	assert!( narrow.itemsets.len() <= 8 );
	for (narrow_set, wide_set) in narrow.itemsets.iter().zip( wide.itemsets.iter() ) {
		assert_eq!( narrow_set.items, wide_set.items );
		assert!( (narrow_set.expected_utility - wide_set.expected_utility).abs() < EPSILON );
	}
}

#[test]
fn returned_ranking_satisfies_the_contract() {
	let (profits, database) = generated_input( 4 );
	let min_prob = 0.25;
	let outcome = mine( &profits, &database, MinerConfig::new( 12, min_prob ));

	assert!( outcome.itemsets.len() <= 12 );
	for pair in outcome.itemsets.windows( 2 ) {
		assert!( pair[0].expected_utility >= pair[1].expected_utility - EPSILON );
		assert!( pair[0].items != pair[1].items );
	}
	for itemset in &outcome.itemsets {
		assert!( !itemset.items.is_empty() );
		assert!( itemset.probability >= min_prob - EPSILON );
		assert!( itemset.support >= 1 );
	}
}

#[test]
fn text_formats_round_trip() {
	let (profits, database) = generated_input( 55 );

	// render the generated data in the loader's text formats
	let mut profit_lines = String::from( "# item profit\n" );
	for item in 1 ..= 60 {
		if let Some( profit ) = profits.get( item ) {
			profit_lines.push_str( &format!( "{item} {profit}\n" ));
		}
	}
	let mut database_lines = String::from( "# item:quantity:probability\n" );
	for transaction in &database {
		let entries: Vec<String> = transaction.postings().iter()
			.map( |posting| format!( "{}:{}:{}", posting.item, posting.quantity, posting.probability ))
			.collect();
		database_lines.push_str( &entries.join( " " ));
		database_lines.push( '\n' );
	}

	let directory = std::env::temp_dir().join( format!( "utilmine-roundtrip-{}", std::process::id() ));
	fs::create_dir_all( &directory ).unwrap();
	let profit_path = directory.join( "profits.txt" );
	let database_path = directory.join( "database.txt" );
	fs::write( &profit_path, profit_lines ).unwrap();
	fs::write( &database_path, database_lines ).unwrap();

	let reloaded_profits = read_profit_table( profit_path.to_str().unwrap() ).unwrap();
	let reloaded_database = read_database( database_path.to_str().unwrap() ).unwrap();
	assert_eq!( reloaded_database.len(), database.len() );

	let direct = mine( &profits, &database, MinerConfig::serial( 10, 0.2 ));
	let reloaded = mine( &reloaded_profits, &reloaded_database, MinerConfig::serial( 10, 0.2 ));
	assert_eq!( result_set( &direct ), result_set( &reloaded ));

	fs::remove_dir_all( &directory ).ok();
}

#[test]
fn cancel_stops_early_with_valid_results() {
	let (profits, database) = generated_input( 13 );
	let engine = MiningEngine::new( profits, MinerConfig::serial( 10, 0.1 )).unwrap();

	let cancel = CancelToken::new();
	cancel.cancel();
	let outcome = engine.mine_with_cancel( &database, &cancel ).unwrap();

	assert!( outcome.cancelled );
	// whatever got in before the stop is still a consistent ranking
	for pair in outcome.itemsets.windows( 2 ) {
		assert!( pair[0].expected_utility >= pair[1].expected_utility - EPSILON );
	}
}

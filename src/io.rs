
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use rustc_hash::FxHashMap;
use tracing::info;

use crate::{Item, Quantity, Tid};
use crate::data::{Posting, ProfitTable, Transaction, UncertainDatabase};
use crate::error::MineError;
use crate::mining::MiningOutcome;

/// Reads a profit table: one `item profit` pair per line, `#` comments and
/// blank lines skipped.
pub fn read_profit_table( path: &str ) -> Result<ProfitTable, MineError> {
	let mut profits: FxHashMap<Item, f64> = FxHashMap::default();
	for line in read_lines( path )? {
		let line = line?;
		if let Some( (item, profit) ) = parse_profit_line( &line )? {
			profits.insert( item, profit );
		}
	}
	info!( "loaded {} profit entries from {path}", profits.len() );
	ProfitTable::new( profits )
}

/// Parses one profit line; None for blanks and comments.
pub fn parse_profit_line( line: &str ) -> Result<Option<(Item, f64)>, MineError> {
	let line = line.trim();
	if line.is_empty() || line.starts_with( '#' ) {
		return Ok( None );
	}
	let mut fields = line.split_whitespace();
	let entry = match (fields.next(), fields.next(), fields.next()) {
		(Some( item ), Some( profit ), None) => {
			let item: Item = item.parse()
				.map_err( |_| MineError::invalid( format!( "bad item id in profit line: {line}" )))?;
			let profit: f64 = profit.parse()
				.map_err( |_| MineError::invalid( format!( "bad profit value in line: {line}" )))?;
			(item, profit)
		}
		_ => return Err( MineError::invalid( format!( "expected `item profit`, got: {line}" ))),
	};
	Ok( Some( entry ))
}

/// Reads a transaction database: one transaction per line as whitespace
/// separated `item:quantity[:probability]` entries. Transactions are numbered
/// from 1 in file order; omitted probabilities default to certainty.
pub fn read_database( path: &str ) -> Result<UncertainDatabase, MineError> {
	let mut transactions = Vec::new();
	for line in read_lines( path )? {
		let line = line?;
		if let Some( transaction ) = parse_transaction_line( &line, transactions.len() + 1 )? {
			transactions.push( transaction );
		}
	}
	info!( "loaded {} transactions from {path}", transactions.len() );
	UncertainDatabase::from_transactions( transactions )
}

/// Parses one transaction line; None for blanks and comments.
pub fn parse_transaction_line( line: &str, tid: Tid ) -> Result<Option<Transaction>, MineError> {
	let line = line.trim();
	if line.is_empty() || line.starts_with( '#' ) {
		return Ok( None );
	}
	let mut postings = Vec::new();
	for entry in line.split_whitespace() {
		let fields: Vec<&str> = entry.split( ':' ).collect();
		if fields.len() < 2 || fields.len() > 3 {
			return Err( MineError::invalid( format!( "expected item:quantity[:probability], got: {entry}" )));
		}
		let item: Item = fields[0].parse()
			.map_err( |_| MineError::invalid( format!( "bad item id in entry: {entry}" )))?;
		let quantity: Quantity = fields[1].parse()
			.map_err( |_| MineError::invalid( format!( "bad quantity in entry: {entry}" )))?;
		let probability: f64 = match fields.get( 2 ) {
			Some( probability ) => probability.parse()
				.map_err( |_| MineError::invalid( format!( "bad probability in entry: {entry}" )))?,
			None => 1.0,
		};
		postings.push( Posting::new( item, quantity, probability ));
	}
	Transaction::new( tid, postings ).map( Some )
}

/// Writes the full outcome, ranking and statistics, as json.
pub fn write_outcome_json( outcome: &MiningOutcome, path: &str ) -> Result<(), MineError> {
	let rendered = serde_json::to_string_pretty( outcome )
		.map_err( |err| MineError::InvariantViolation( err.to_string() ))?;
	let mut file = File::create( Path::new( path ))?;
	write!( file, "{rendered}" )?;
	Ok( () )
}

/// Writes the ranking alone as csv, one itemset per row.
pub fn write_outcome_csv( outcome: &MiningOutcome, path: &str ) -> Result<(), MineError> {
	let mut file = File::create( Path::new( path ))?;
	writeln!( file, "items,expected_utility,probability,support" )?;
	for itemset in &outcome.itemsets {
		let items = itemset.items.iter()
			.map( |item| item.to_string() )
			.collect::<Vec<_>>()
			.join( " " );
		writeln!( file, "{},{},{},{}", items, itemset.expected_utility, itemset.probability, itemset.support )?;
	}
	Ok( () )
}

fn read_lines( path: &str ) -> Result<impl Iterator<Item = Result<String, MineError>>, MineError> {
	let file = File::open( Path::new( path ))?;
	let reader = BufReader::new( file );
	Ok( reader.lines().map( |line| line.map_err( MineError::from )))
}

#[cfg(test)]
mod test {

	use super::*;

	#[test]
	fn test_parse_profit_lines() {
		assert_eq!( parse_profit_line( "3 12.5" ).unwrap(), Some( (3, 12.5) ));
		assert_eq!( parse_profit_line( "7 -4" ).unwrap(), Some( (7, -4.0) ));
		assert_eq!( parse_profit_line( "" ).unwrap(), None );
		assert_eq!( parse_profit_line( "  # comment" ).unwrap(), None );
		assert!( parse_profit_line( "3" ).is_err() );
		assert!( parse_profit_line( "3 x" ).is_err() );
		assert!( parse_profit_line( "3 1.0 extra" ).is_err() );
	}

	#[test]
	fn test_parse_transaction_lines() {
		let transaction = parse_transaction_line( "1:2:0.9 4:1", 1 ).unwrap().unwrap();
		assert_eq!( transaction.tid(), 1 );
		assert_eq!( transaction.len(), 2 );
		let postings = transaction.postings();
		assert_eq!( postings[0].item, 1 );
		assert_eq!( postings[0].quantity, 2 );
		assert_eq!( postings[0].probability, 0.9 );
		// omitted probability means the item is certainly there
		assert_eq!( postings[1].item, 4 );
		assert_eq!( postings[1].probability, 1.0 );

		assert!( parse_transaction_line( "", 1 ).unwrap().is_none() );
		assert!( parse_transaction_line( "# header", 1 ).unwrap().is_none() );
		assert!( parse_transaction_line( "1", 1 ).is_err() );
		assert!( parse_transaction_line( "1:2:0.5:9", 1 ).is_err() );
		assert!( parse_transaction_line( "1:0", 1 ).is_err() );
		assert!( parse_transaction_line( "1:1:1.5", 1 ).is_err() );
	}

	#[test]
	fn test_writers_produce_files() {
		let profits = ProfitTable::from_pairs( vec!( (1, 5.0), (2, 10.0) )).unwrap();
		let database = UncertainDatabase::from_transactions( vec!(
			parse_transaction_line( "1:2:0.9 2:4:0.8", 1 ).unwrap().unwrap(),
		)).unwrap();
		let engine = crate::MiningEngine::new( profits, crate::MinerConfig::serial( 2, 0.1 )).unwrap();
		let outcome = engine.mine( &database ).unwrap();

		let directory = std::env::temp_dir().join( format!( "utilmine-io-{}", std::process::id() ));
		std::fs::create_dir_all( &directory ).unwrap();
		let json_path = directory.join( "outcome.json" );
		let csv_path = directory.join( "outcome.csv" );

		write_outcome_json( &outcome, json_path.to_str().unwrap() ).unwrap();
		write_outcome_csv( &outcome, csv_path.to_str().unwrap() ).unwrap();

		let json = std::fs::read_to_string( &json_path ).unwrap();
		assert!( json.contains( "expected_utility" ));
		assert!( json.contains( "candidates_generated" ));
		let csv = std::fs::read_to_string( &csv_path ).unwrap();
		assert!( csv.starts_with( "items,expected_utility" ));
		assert!( csv.lines().count() >= 2 );

		std::fs::remove_dir_all( &directory ).ok();
	}
}

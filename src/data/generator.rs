
use rand::prelude::*;
use rand::distributions::WeightedIndex;
use rustc_hash::FxHashMap;
use statrs::distribution::Binomial;
use tracing::debug;

use super::{Item, Quantity, Tid, Posting, Transaction, UncertainDatabase, ProfitTable};

/// Shape of the synthetic data: how many transactions and items, and the
/// ranges quantities, probabilities and profits are drawn from.
#[derive( Debug, Clone )]
pub struct GeneratorConfig {
	pub num_transactions: usize,
	pub num_items: usize,
	pub max_items_per_transaction: usize,
	pub quantity_range: (Quantity, Quantity),
	pub probability_range: (f64, f64),
	pub profit_range: (f64, f64),
	/// Fraction of items that carry a negative profit
	pub negative_ratio: f64,
	/// Skews item popularity when set; uniform otherwise
	pub zipf_exponent: Option<f64>,
}

impl Default for GeneratorConfig {
	fn default() -> GeneratorConfig {
		GeneratorConfig {
			num_transactions: 1000,
			num_items: 100,
			max_items_per_transaction: 10,
			quantity_range: (1, 5),
			probability_range: (0.3, 1.0),
			profit_range: (0.5, 50.0),
			negative_ratio: 0.1,
			zipf_exponent: None,
		}
	}
}

/// Seeded generator for profit tables and uncertain databases.
pub struct DataGenerator {
	config: GeneratorConfig,
	rng: StdRng,
}

impl DataGenerator {

	pub fn new( config: GeneratorConfig, seed: u64 ) -> DataGenerator {
		DataGenerator { config, rng: StdRng::seed_from_u64( seed ) }
	}

	/// Draws a profit for every item; a configured fraction turns out negative.
	pub fn generate_profits( &mut self ) -> ProfitTable {
		let (low, high) = self.config.profit_range;
		let mut profits: FxHashMap<Item, f64> = FxHashMap::default();
		for item in 1 ..= self.config.num_items {
			let magnitude = self.rng.gen_range( low ..= high );
			let profit = if self.rng.gen::<f64>() < self.config.negative_ratio {
				-magnitude
			} else {
				magnitude
			};
			profits.insert( item, profit );
		}
		ProfitTable::new( profits ).expect( "generator always yields at least one profit" )
	}

	/// Builds the transactions one by one. Items within a transaction are distinct.
	pub fn generate_database( &mut self ) -> UncertainDatabase {
		let popularity = self.item_popularity();
		let length_model = Binomial::new( 0.5, self.config.max_items_per_transaction as u64 )
			.expect( "binomial parameters are fixed and valid" );

		let mut transactions = Vec::with_capacity( self.config.num_transactions );
		for tid in 1 ..= self.config.num_transactions {
			let length = (length_model.sample( &mut self.rng ) as usize).max( 1 );
			transactions.push( self.generate_transaction( tid as Tid, length, &popularity ));
		}
		debug!( "generated {} transactions over {} items", transactions.len(), self.config.num_items );
		UncertainDatabase::from_transactions( transactions ).expect( "generated tids are unique" )
	}

	fn generate_transaction( &mut self, tid: Tid, length: usize, popularity: &WeightedIndex<f64> ) -> Transaction {
		let (quantity_low, quantity_high) = self.config.quantity_range;
		let (probability_low, probability_high) = self.config.probability_range;

		let mut chosen: Vec<Item> = Vec::with_capacity( length );
		// rejection sampling keeps items distinct; the universe is much larger than a transaction
		while chosen.len() < length {
			let item = popularity.sample( &mut self.rng ) + 1;
			if !chosen.contains( &item ) {
				chosen.push( item );
			}
		}

		let postings = chosen.into_iter()
			.map( |item| Posting::new(
				item,
				self.rng.gen_range( quantity_low ..= quantity_high ),
				self.rng.gen_range( probability_low ..= probability_high ),
			))
			.collect();
		Transaction::new( tid, postings ).expect( "generated postings are valid" )
	}

	fn item_popularity( &self ) -> WeightedIndex<f64> {
		let weights: Vec<f64> = match self.config.zipf_exponent {
			Some( exponent ) => (1 ..= self.config.num_items)
				.map( |rank| 1.0 / (rank as f64).powf( exponent ))
				.collect(),
			None => vec!( 1.0; self.config.num_items ),
		};
		WeightedIndex::new( &weights ).expect( "popularity weights are positive" )
	}
}

#[cfg(test)]
mod test {

	use super::*;

	#[test]
	fn test_generation_is_seeded() {
		let config = GeneratorConfig { num_transactions: 50, num_items: 20, ..GeneratorConfig::default() };
		let mut first = DataGenerator::new( config.clone(), 42 );
		let mut second = DataGenerator::new( config, 42 );

		let database_a = first.generate_database();
		let database_b = second.generate_database();
		assert_eq!( database_a.len(), database_b.len() );
		for (left, right) in database_a.into_iter().zip( database_b.into_iter() ) {
			assert_eq!( left.tid(), right.tid() );
			assert_eq!( left.postings(), right.postings() );
		}
	}

	#[test]
	fn test_generated_data_is_valid() {
		let config = GeneratorConfig {
			num_transactions: 100,
			num_items: 30,
			negative_ratio: 0.3,
			zipf_exponent: Some( 1.2 ),
			..GeneratorConfig::default()
		};
		let mut generator = DataGenerator::new( config.clone(), 7 );
		let profits = generator.generate_profits();
		let database = generator.generate_database();

		assert_eq!( profits.len(), config.num_items );
		assert_eq!( database.len(), config.num_transactions );
		for transaction in &database {
			assert!( transaction.len() >= 1 );
			assert!( transaction.len() <= config.max_items_per_transaction );
			for posting in transaction.postings() {
				assert!( posting.quantity >= config.quantity_range.0 );
				assert!( posting.quantity <= config.quantity_range.1 );
				assert!( posting.probability >= config.probability_range.0 );
				assert!( posting.probability <= config.probability_range.1 );
				assert!( profits.get( posting.item ).is_some() );
			}
		}
	}
}

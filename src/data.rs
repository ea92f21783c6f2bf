
use rustc_hash::FxHashMap;

use crate::error::MineError;

mod generator;

pub use generator::{DataGenerator, GeneratorConfig};

pub type Item = usize;
pub type Tid = usize;
pub type Quantity = u32;
pub type Count = u64;

/// One item occurrence inside a transaction: how many units, and how likely it is there at all.
#[derive( Debug, Clone, Copy, PartialEq )]
pub struct Posting {
	pub item: Item,
	pub quantity: Quantity,
	pub probability: f64,
}

impl Posting {
	pub fn new( item: Item, quantity: Quantity, probability: f64 ) -> Posting {
		Posting { item, quantity, probability }
	}
}

/// A single uncertain transaction. Immutable once ingested.
#[derive( Debug, Clone )]
pub struct Transaction {
	tid: Tid,
	postings: Vec<Posting>,
}

impl Transaction {

	/// Validates and builds a transaction. Postings are kept sorted by item id.
	pub fn new( tid: Tid, mut postings: Vec<Posting> ) -> Result<Transaction, MineError> {
		if tid < 1 {
			return Err( MineError::invalid( format!( "transaction id must be positive, got {tid}" )));
		}
		if postings.is_empty() {
			return Err( MineError::invalid( format!( "transaction {tid} has no items" )));
		}
		for posting in &postings {
			if posting.quantity < 1 {
				return Err( MineError::invalid( format!(
					"transaction {tid}: item {} has non-positive quantity", posting.item )));
			}
			if !posting.probability.is_finite() || posting.probability < 0.0 || posting.probability > 1.0 {
				return Err( MineError::invalid( format!(
					"transaction {tid}: item {} has probability {} outside [0, 1]", posting.item, posting.probability )));
			}
		}
		postings.sort_by_key( |posting| posting.item );
		if postings.windows( 2 ).any( |pair| pair[0].item == pair[1].item ) {
			return Err( MineError::invalid( format!( "transaction {tid} lists an item twice" )));
		}
		Ok( Transaction { tid, postings } )
	}

	pub fn tid( &self ) -> Tid {
		self.tid
	}

	pub fn postings( &self ) -> &[Posting] {
		&self.postings
	}

	pub fn len( &self ) -> usize {
		self.postings.len()
	}

	pub fn is_empty( &self ) -> bool {
		self.postings.is_empty()
	}
}

/// An uncertain transaction database, held in memory and sorted by transaction id.
#[derive( Debug, Clone )]
pub struct UncertainDatabase {
	transactions: Vec<Transaction>,
}

impl UncertainDatabase {

	/// Takes ownership of the transactions, sorts them by tid and rejects duplicates.
	pub fn from_transactions( mut transactions: Vec<Transaction> ) -> Result<UncertainDatabase, MineError> {
		if transactions.is_empty() {
			return Err( MineError::invalid( "database contains no transactions" ));
		}
		transactions.sort_by_key( |transaction| transaction.tid );
		if let Some( pair ) = transactions.windows( 2 ).find( |pair| pair[0].tid == pair[1].tid ) {
			return Err( MineError::invalid( format!( "duplicate transaction id {}", pair[0].tid )));
		}
		Ok( UncertainDatabase { transactions } )
	}

	pub fn transactions( &self ) -> &[Transaction] {
		&self.transactions
	}

	pub fn len( &self ) -> usize {
		self.transactions.len()
	}

	pub fn is_empty( &self ) -> bool {
		self.transactions.is_empty()
	}
}

impl <'a> IntoIterator for &'a UncertainDatabase {
	type Item = &'a Transaction;
	type IntoIter = std::slice::Iter<'a, Transaction>;

	fn into_iter( self ) -> Self::IntoIter {
		self.transactions.iter()
	}
}

/// Per-item profit, possibly negative. Immutable during a mining run.
#[derive( Debug, Clone )]
pub struct ProfitTable {
	profits: FxHashMap<Item, f64>,
}

impl ProfitTable {

	pub fn new( profits: FxHashMap<Item, f64> ) -> Result<ProfitTable, MineError> {
		if profits.is_empty() {
			return Err( MineError::invalid( "profit table is empty" ));
		}
		if let Some( (item, profit) ) = profits.iter().find( |(_, profit)| !profit.is_finite() ) {
			return Err( MineError::invalid( format!( "item {item} has non-finite profit {profit}" )));
		}
		Ok( ProfitTable { profits } )
	}

	pub fn from_pairs<I>( pairs: I ) -> Result<ProfitTable, MineError> where
		I: IntoIterator<Item = (Item, f64)>,
	{
		ProfitTable::new( pairs.into_iter().collect() )
	}

	pub fn get( &self, item: Item ) -> Option<f64> {
		self.profits.get( &item ).copied()
	}

	pub fn len( &self ) -> usize {
		self.profits.len()
	}

	pub fn is_empty( &self ) -> bool {
		self.profits.is_empty()
	}
}

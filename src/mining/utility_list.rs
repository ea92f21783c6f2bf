
use std::mem;

use crate::{Itemvec, Tid};

/// Per-transaction row of a utility list.
#[derive( Debug, Clone, Copy )]
pub struct Element {
	pub tid: Tid,
	/// Signed utility of the itemset in this transaction
	pub utility: f64,
	/// Positive utility still available after the itemset's last ranked item
	pub remaining: f64,
	/// Log of the joint existence probability in this transaction
	pub log_prob: f64,
}

impl Element {

	pub fn new( tid: Tid, utility: f64, remaining: f64, log_prob: f64 ) -> Element {
		Element { tid, utility, remaining, log_prob }
	}

	pub fn probability( &self ) -> f64 {
		self.log_prob.exp()
	}
}

/// Utility list of one itemset: its rows plus aggregates folded once at
/// construction so every later read is O(1). Rows are never mutated afterwards.
#[derive( Debug, Clone )]
pub struct UtilityList {
	itemset: Itemvec,
	rtwu: f64,
	elements: Vec<Element>,
	sum_eu: f64,
	sum_remaining: f64,
	exist_prob: f64,
}

impl UtilityList {

	/// Elements must arrive sorted by tid; joins and the builder both guarantee it.
	pub fn new( itemset: Itemvec, rtwu: f64, elements: Vec<Element> ) -> UtilityList {
		debug_assert!(
			elements.windows( 2 ).all( |pair| pair[0].tid < pair[1].tid ),
			"utility list elements out of tid order"
		);

		let mut sum_eu = 0.0;
		let mut sum_remaining = 0.0;
		// log of the probability that the itemset is absent from every transaction
		let mut log_absent = 0.0;
		for element in &elements {
			sum_eu += element.utility * element.log_prob.exp();
			sum_remaining += element.remaining;
			log_absent += (-element.log_prob.exp()).ln_1p();
		}
		let exist_prob = if elements.is_empty() { 0.0 } else { 1.0 - log_absent.exp() };

		UtilityList { itemset, rtwu, elements, sum_eu, sum_remaining, exist_prob }
	}

	pub fn itemset( &self ) -> &[crate::Item] {
		&self.itemset
	}

	pub fn rtwu( &self ) -> f64 {
		self.rtwu
	}

	pub fn elements( &self ) -> &[Element] {
		&self.elements
	}

	/// Expected utility summed over all transactions
	pub fn sum_eu( &self ) -> f64 {
		self.sum_eu
	}

	pub fn sum_remaining( &self ) -> f64 {
		self.sum_remaining
	}

	/// Probability that the itemset occurs in at least one transaction
	pub fn exist_prob( &self ) -> f64 {
		self.exist_prob
	}

	pub fn upper_bound( &self ) -> f64 {
		self.sum_eu + self.sum_remaining
	}

	pub fn support( &self ) -> usize {
		self.elements.len()
	}

	pub fn is_empty( &self ) -> bool {
		self.elements.is_empty()
	}

	/// Approximate heap footprint, used for peak memory accounting.
	pub fn footprint_bytes( &self ) -> u64 {
		(self.elements.capacity() * mem::size_of::<Element>() + self.itemset.capacity() * mem::size_of::<crate::Item>()) as u64
	}
}

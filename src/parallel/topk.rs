
use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use bit_set::BitSet;
use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned, Shared};
use tracing::trace;

use crate::{EPSILON, MAX_CAS_RETRIES, Item, Itemvec};

/// One resident itemset with its scores. Entries are immutable; updates
/// replace the whole slot.
#[derive( Debug, Clone )]
pub struct TopKEntry {
	items: BitSet,
	expected_utility: f64,
	probability: f64,
	support: usize,
	stamp: u64,
}

impl TopKEntry {

	pub fn items( &self ) -> Itemvec {
		self.items.iter().collect()
	}

	pub fn expected_utility( &self ) -> f64 {
		self.expected_utility
	}

	pub fn probability( &self ) -> f64 {
		self.probability
	}

	pub fn support( &self ) -> usize {
		self.support
	}

	/// Best first: utility, then probability, then smaller itemsets, then age.
	fn compare( &self, other: &TopKEntry ) -> CmpOrdering {
		other.expected_utility.total_cmp( &self.expected_utility )
			.then( other.probability.total_cmp( &self.probability ))
			.then( self.items.len().cmp( &other.items.len() ))
			.then( self.stamp.cmp( &other.stamp ))
	}
}

/// Lock-free accumulator of the k best itemsets seen so far.
///
/// Slots hold epoch-managed entries updated by compare-and-swap; replaced
/// entries are retired through the epoch collector so concurrent snapshots
/// never observe freed memory. The published threshold only ever rises.
pub struct TopKAccumulator {
	k: usize,
	slots: Box<[Atomic<TopKEntry>]>,
	size: AtomicUsize,
	threshold_bits: AtomicU64,
	stamp: AtomicU64,
	successful_updates: AtomicU64,
	cas_retries: AtomicU64,
	failed_updates: AtomicU64,
}

impl TopKAccumulator {

	pub fn new( k: usize ) -> TopKAccumulator {
		assert!( k >= 1, "capacity must be positive" );
		let slots = (0 .. k).map( |_| Atomic::null() ).collect::<Vec<_>>().into_boxed_slice();
		TopKAccumulator {
			k,
			slots,
			size: AtomicUsize::new( 0 ),
			threshold_bits: AtomicU64::new( 0.0_f64.to_bits() ),
			stamp: AtomicU64::new( 0 ),
			successful_updates: AtomicU64::new( 0 ),
			cas_retries: AtomicU64::new( 0 ),
			failed_updates: AtomicU64::new( 0 ),
		}
	}

	pub fn capacity( &self ) -> usize {
		self.k
	}

	pub fn len( &self ) -> usize {
		self.size.load( Ordering::Acquire ).min( self.k )
	}

	pub fn is_empty( &self ) -> bool {
		self.len() == 0
	}

	/// Current acceptance threshold: the weakest resident utility once k
	/// entries are in, zero before that.
	pub fn threshold( &self ) -> f64 {
		f64::from_bits( self.threshold_bits.load( Ordering::Relaxed ))
	}

	/// Offers an itemset. Returns true when it ends up resident, either in a
	/// free slot, as an improvement of the same itemset, or by displacing the
	/// weakest entry.
	pub fn try_add( &self, items: &[Item], expected_utility: f64, probability: f64, support: usize ) -> bool {
		if expected_utility < self.threshold() - EPSILON {
			self.failed_updates.fetch_add( 1, Ordering::Relaxed );
			return false;
		}

		let guard = epoch::pin();
		let mut candidate = Owned::new( TopKEntry {
			items: to_bitset( items ),
			expected_utility,
			probability,
			support,
			stamp: self.stamp.fetch_add( 1, Ordering::Relaxed ),
		});

		// claim a free slot first
		for slot in self.slots.iter() {
			if slot.load( Ordering::Acquire, &guard ).is_null() {
				match slot.compare_exchange( Shared::null(), candidate, Ordering::AcqRel, Ordering::Acquire, &guard ) {
					Ok( _ ) => {
						self.size.fetch_add( 1, Ordering::AcqRel );
						self.successful_updates.fetch_add( 1, Ordering::Relaxed );
						self.publish_threshold( &guard );
						trace!( "claimed free slot at eu {expected_utility}" );
						return true;
					}
					Err( failure ) => {
						self.cas_retries.fetch_add( 1, Ordering::Relaxed );
						candidate = failure.new;
					}
				}
			}
		}

		// the same itemset may already be resident; keep only the better score
		for slot in self.slots.iter() {
			let current = slot.load( Ordering::Acquire, &guard );
			let existing = match unsafe { current.as_ref() } {
				Some( existing ) => existing,
				None => continue,
			};
			if existing.items != candidate.items {
				continue;
			}
			if candidate.expected_utility <= existing.expected_utility + EPSILON {
				self.failed_updates.fetch_add( 1, Ordering::Relaxed );
				return false;
			}
			candidate.probability = candidate.probability.max( existing.probability );
			return match slot.compare_exchange( current, candidate, Ordering::AcqRel, Ordering::Acquire, &guard ) {
				Ok( _ ) => {
					unsafe { guard.defer_destroy( current ) };
					self.successful_updates.fetch_add( 1, Ordering::Relaxed );
					self.publish_threshold( &guard );
					true
				}
				Err( _ ) => {
					// someone else holds an equal or better entry now
					self.cas_retries.fetch_add( 1, Ordering::Relaxed );
					self.failed_updates.fetch_add( 1, Ordering::Relaxed );
					false
				}
			};
		}

		if self.size.load( Ordering::Acquire ) >= self.k {
			return self.try_replace_weakest( candidate, &guard );
		}

		self.failed_updates.fetch_add( 1, Ordering::Relaxed );
		false
	}

	fn try_replace_weakest( &self, mut candidate: Owned<TopKEntry>, guard: &Guard ) -> bool {
		for _retry in 0 .. MAX_CAS_RETRIES {
			let mut weakest: Option<(usize, Shared<TopKEntry>, f64)> = None;
			for (index, slot) in self.slots.iter().enumerate() {
				let current = slot.load( Ordering::Acquire, guard );
				if let Some( entry ) = unsafe { current.as_ref() } {
					let beaten = match weakest {
						Some( (_, _, utility) ) => entry.expected_utility < utility,
						None => true,
					};
					if beaten {
						weakest = Some( (index, current, entry.expected_utility) );
					}
				}
			}

			let (index, current, weakest_utility) = match weakest {
				Some( found ) => found,
				None => break,
			};
			if candidate.expected_utility <= weakest_utility + EPSILON {
				self.failed_updates.fetch_add( 1, Ordering::Relaxed );
				return false;
			}

			match self.slots[index].compare_exchange( current, candidate, Ordering::AcqRel, Ordering::Acquire, guard ) {
				Ok( _ ) => {
					unsafe { guard.defer_destroy( current ) };
					self.successful_updates.fetch_add( 1, Ordering::Relaxed );
					self.publish_threshold( guard );
					trace!( "displaced weakest entry at eu {weakest_utility}" );
					return true;
				}
				Err( failure ) => {
					self.cas_retries.fetch_add( 1, Ordering::Relaxed );
					candidate = failure.new;
				}
			}
		}

		self.failed_updates.fetch_add( 1, Ordering::Relaxed );
		false
	}

	/// Re-derives the threshold from the resident minimum. The store is a
	/// max loop, so a racing reader can see a stale value but never a lower
	/// one than it already observed.
	fn publish_threshold( &self, guard: &Guard ) {
		if self.size.load( Ordering::Acquire ) < self.k {
			return;
		}
		let mut populated = 0;
		let mut minimum = f64::INFINITY;
		for slot in self.slots.iter() {
			if let Some( entry ) = unsafe { slot.load( Ordering::Acquire, guard ).as_ref() } {
				populated += 1;
				minimum = minimum.min( entry.expected_utility );
			}
		}
		if populated < self.k {
			return;
		}

		let mut observed = self.threshold_bits.load( Ordering::Relaxed );
		while minimum > f64::from_bits( observed ) {
			match self.threshold_bits.compare_exchange_weak(
				observed,
				minimum.to_bits(),
				Ordering::AcqRel,
				Ordering::Relaxed,
			) {
				Ok( _ ) => break,
				Err( bits ) => observed = bits,
			}
		}
	}

	/// Consistent-enough read of the resident entries, best first. Entries are
	/// copied out under the epoch guard, so none of them is ever torn.
	pub fn snapshot( &self ) -> Vec<TopKEntry> {
		let guard = epoch::pin();
		let mut entries: Vec<TopKEntry> = Vec::with_capacity( self.k );
		for slot in self.slots.iter() {
			if let Some( entry ) = unsafe { slot.load( Ordering::Acquire, &guard ).as_ref() } {
				entries.push( entry.clone() );
			}
		}
		entries.sort_by( TopKEntry::compare );
		entries
	}

	pub fn successful_updates( &self ) -> u64 {
		self.successful_updates.load( Ordering::Relaxed )
	}

	pub fn cas_retries( &self ) -> u64 {
		self.cas_retries.load( Ordering::Relaxed )
	}

	pub fn failed_updates( &self ) -> u64 {
		self.failed_updates.load( Ordering::Relaxed )
	}

	pub fn cas_efficiency( &self ) -> f64 {
		let successful = self.successful_updates();
		let total = successful + self.cas_retries();
		if total == 0 {
			1.0
		} else {
			successful as f64 / total as f64
		}
	}
}

impl Drop for TopKAccumulator {
	fn drop( &mut self ) {
		// no other thread can hold a reference anymore
		let guard = unsafe { epoch::unprotected() };
		for slot in self.slots.iter() {
			let current = slot.load( Ordering::Relaxed, guard );
			if !current.is_null() {
				drop( unsafe { current.into_owned() });
			}
		}
	}
}

fn to_bitset( items: &[Item] ) -> BitSet {
	let mut set = BitSet::new();
	for item in items {
		set.insert( *item );
	}
	set
}


use clap::{self, Parser};
use tracing::info;

use utilmine::*;
use io::{read_database, read_profit_table, write_outcome_json};

#[derive( Parser )]
struct Arguments {
	/// profit table to load
	#[arg()]
	profits_path: String,
	/// transaction database to mine
	#[arg()]
	database_path: String,
	/// number of itemsets to return
	#[arg( short, long, default_value_t = 10 )]
	k: usize,
	/// minimum existential probability of returned itemsets
	#[arg( long, default_value_t = 0.0 )]
	min_prob: f64,
	/// disable the worker pool and mine on one thread
	#[arg( long, default_value_t = false )]
	serial: bool,
	/// worker threads, defaults to the machine's parallelism
	#[arg( long )]
	threads: Option<usize>,
	/// enable the adaptive rtwu pruning factor
	#[arg( long, default_value_t = false )]
	adaptive: bool,
	/// Run with debug logging
	#[arg( long, default_value_t = false )]
	debug: bool,
	/// optional path to write the outcome to as json
	#[arg( long )]
	out_path: Option<String>,
}

fn setup_logging( args: &Arguments ) -> Result<(), String> {
	let tracer = tracing_subscriber::fmt::fmt();
	let tracer = if args.debug {
		tracer.with_max_level( tracing_subscriber::filter::LevelFilter::TRACE )
	} else {
		tracer.with_max_level( tracing_subscriber::filter::LevelFilter::INFO )
	};
	let tracer = tracer.finish();
	tracing::subscriber::set_global_default( tracer ).map_err( |err| err.to_string() )
}

fn build_engine( args: &Arguments, profits: ProfitTable ) -> Result<MiningEngine, String> {
	let config = MinerConfig {
		k: args.k,
		min_prob: args.min_prob,
		threads: args.threads,
		parallel: !args.serial,
		adaptive_rtwu: args.adaptive,
	};
	MiningEngine::new( profits, config ).map_err( |err| err.to_string() )
}

fn report_results( outcome: &MiningOutcome ) {
	for (position, itemset) in outcome.itemsets.iter().enumerate() {
		println!(
			"{:>3}. {:?}  eu={:.4}  p={:.4}  support={}",
			position + 1, itemset.items, itemset.expected_utility, itemset.probability, itemset.support
		);
	}
	let statistics = &outcome.statistics;
	info!(
		"generated {} candidates, pruned {} ({:.1}%), {} utility lists, {} ms",
		statistics.candidates_generated,
		statistics.candidates_pruned,
		statistics.pruning_effectiveness * 100.0,
		statistics.utility_lists_created,
		statistics.execution_time_ms,
	);
	info!(
		"top-k updates {} with {} cas retries ({:.1}% efficient), peak memory {} bytes",
		statistics.successful_updates,
		statistics.cas_retries,
		statistics.cas_efficiency * 100.0,
		statistics.peak_memory_bytes,
	);
	if outcome.cancelled {
		info!( "run was cancelled, ranking reflects the work finished so far" );
	}
}

fn finalize_results( args: &Arguments, outcome: &MiningOutcome ) -> Result<(), String> {
	if let Some( path ) = &args.out_path {
		write_outcome_json( outcome, path.as_str() ).map_err( |err| err.to_string() )
	} else {
		Result::Ok( () )
	}
}

fn main() -> Result<(), String> {
	let args = Arguments::parse();
	setup_logging( &args )?;
	let profits = read_profit_table( &args.profits_path ).map_err( |err| err.to_string() )?;
	let database = read_database( &args.database_path ).map_err( |err| err.to_string() )?;
	let engine = build_engine( &args, profits )?;
	let outcome = engine.mine( &database ).map_err( |err| err.to_string() )?;
	report_results( &outcome );
	finalize_results( &args, &outcome )
}

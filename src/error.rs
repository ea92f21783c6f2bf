
use thiserror::Error;

/// Failure cases surfaced by mining runs and the loaders.
#[derive( Debug, Error )]
pub enum MineError {
	/// Rejected before the run starts: empty inputs, bad parameters, malformed records.
	#[error( "invalid input: {0}" )]
	InvalidInput( String ),

	#[error( "io error: {0}" )]
	Io( #[from] std::io::Error ),

	/// Worker pool could not be brought up or an allocation limit was hit.
	#[error( "resource exhaustion: {0}" )]
	ResourceExhaustion( String ),

	/// A bug, not an input problem. Never masked.
	#[error( "internal invariant violated: {0}" )]
	InvariantViolation( String ),
}

impl MineError {
	pub fn invalid<S: Into<String>>( reason: S ) -> MineError {
		MineError::InvalidInput( reason.into() )
	}
}

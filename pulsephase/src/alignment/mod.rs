//! Alignment of observation records to phase predictors.
//!
//! An [`Observation`] carries records folded at known epochs, the timing
//! model they were folded with, and the predictor generated from it. The
//! [`Aligner`] keeps the predictor covering every record, reusing segments
//! where it can, and rotates records so that each epoch falls on zero
//! phase of the installed predictor.
//!
//! Two flags track the state:
//!
//! - `runtime_model` (per observation): the predictor reflects the current
//!   parameters.
//! - `zero_phase_aligned` (per record): the epoch has been corrected against
//!   the installed predictor.
//!
//! Both are cleared by [`Observation::set_parameters`].
//!
//! # Example
//!
//! ```ignore
//! let mut aligner = Aligner::new(generator::from_config(&config)?)
//!     .with_config(AlignConfig::from_config(&config));
//! aligner.update_model(&mut observation)?;
//! aligner.append(&mut observation, &later)?;
//! ```

mod aligner;
mod observation;

pub use aligner::{AlignConfig, Aligner};
pub use observation::{IndexOrder, Observation, Record, SourceType};

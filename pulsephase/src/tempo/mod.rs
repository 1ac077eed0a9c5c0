//! TEMPO process plumbing.
//!
//! Polyco generation runs the external `tempo` program in a shared working
//! directory:
//!
//! ```text
//!   lock ScratchDir
//!     ├── write tz.in
//!     ├── run  tempo -z -f pulsar.eph   (stdin: " m1 m2\n")
//!     ├── read .stderr                  (any line is fatal)
//!     └── read polyco.dat
//!   unlock
//! ```
//!
//! [`FitBackend`] is the seam between the generator and the process, so
//! tests can substitute a fake program.

mod backend;
mod scratch;

pub use backend::{FitBackend, TempoCommand, DIAGNOSTICS_FILE};
pub use scratch::{ScratchDir, ScratchGuard};

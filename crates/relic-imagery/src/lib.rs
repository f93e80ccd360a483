// crates/relic-imagery/src/lib.rs
//
// relic-imagery: Preprocessing and index computation for the Relic monitor.
//
// Turns the raw scenes an imagery source delivers into one cloud-masked,
// AOI-clipped composite per window, and evaluates spectral indices over it.
// Everything here is pure and CPU-bound; callers run it on a blocking pool.

pub mod composite;
pub mod indices;
pub mod mask;
pub mod stats;

pub use composite::compose;
pub use indices::compute;
pub use stats::stats;

// crates/relic-pipeline/src/lib.rs
//
// relic-pipeline: Orchestration for the Relic heritage monitor.
//
// Wires an imagery source, the preprocessing and detection crates, a store,
// and alert sinks into one run per (site, index, tick). Runs for different
// keys proceed in parallel; runs for the same key are serialised. A central
// scheduler owns one cancellable task per active site.

pub mod events;
pub mod locks;
pub mod runner;
pub mod scheduler;

pub use events::MonitorEvent;
pub use locks::KeyedLocks;
pub use runner::Pipeline;
pub use scheduler::Scheduler;

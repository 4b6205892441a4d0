// Deadlock Engine Module
// Avoidance (Banker's safety check), detection (wait-for graph cycles), recovery

pub mod bankers;
pub mod cycles;
pub mod recovery;
pub mod wait_graph;

pub use bankers::*;
pub use cycles::*;
pub use recovery::*;
pub use wait_graph::*;

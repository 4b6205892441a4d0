// Snapshot Model
// Processes, resources and the allocation / request matrices shared by every analysis

pub mod model;
pub mod types;
pub mod wire;

pub use model::*;
pub use types::*;
pub use wire::{decode_cell_key, encode_cell_key, WireProcess, WireResource, WireSnapshot};

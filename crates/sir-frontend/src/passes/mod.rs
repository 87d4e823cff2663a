// Passes run over an emitted graph before it is handed to the optimizer.

mod lift_closures;

pub use lift_closures::*;

//! LifeGen engine internals and public API.

mod engine;
mod error;
pub mod key;
mod ledger;
mod store;

pub use engine::{
    COLOUR_MODE_MASK, GenerationReport, LifeGen, LifeGenConfig, OnGenerationDone, OnStopped,
    RUN_FOREVER, SELECT_MODE_MASK,
};
pub use error::LifeGenError;
pub use ledger::DeadCellLedger;
pub use store::{Cell, CellMut, CellStore, Cells};

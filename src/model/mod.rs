//! Feature-model formulas and their randomized variants.
//!
//! - [`Cnf`] / [`Variables`]: a formula over named, 1-based variables
//! - [`dimacs`]: reading and writing the DIMACS exchange format
//! - [`ModelRepository`]: resolving prepared systems by name
//! - [`variant`]: seeded randomization and name-based literal remapping

pub mod cnf;
pub mod dimacs;
pub mod reader;
pub mod variant;

pub use cnf::{Cnf, Variables};
pub use reader::{is_accepted_model, FileModelReader, ModelReader, ModelRepository, MODEL_FILE_NAME};
pub use variant::{iteration_seed, randomize, remap, remap_configuration};

// Application layer: validated, atomic ledger operations over the storage stores.

mod config;
pub mod error;
mod service;

pub use config::*;
pub use error::*;
pub use service::*;

mod clock;
mod money;
mod order;
mod report;
mod transaction;
mod transfer;
mod user;
mod validation;

pub use clock::*;
pub use money::*;
pub use order::*;
pub use report::*;
pub use transaction::*;
pub use transfer::*;
pub use user::*;
pub use validation::*;

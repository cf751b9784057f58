mod category;
mod format;
mod ledger;
mod money;
mod receipt;
mod summary;
mod transaction;
mod user;
mod validation;

pub use category::*;
pub use format::*;
pub use ledger::*;
pub use money::*;
pub use receipt::*;
pub use summary::*;
pub use transaction::*;
pub use user::*;
pub use validation::*;

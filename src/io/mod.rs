pub mod export;
pub mod import;

pub use export::*;
pub use import::*;

/// Column layout shared by transaction export and import.
pub const TRANSACTION_CSV_HEADER: [&str; 6] =
    ["id", "date", "kind", "category", "amount", "description"];

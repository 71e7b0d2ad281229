pub mod listing;
pub mod transaction;

pub use listing::Entity as Listing;
pub use transaction::Entity as Transaction;

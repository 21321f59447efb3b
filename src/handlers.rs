pub mod credits;
pub mod documents;
pub mod ledger;

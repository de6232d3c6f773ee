pub mod chat;
pub mod ledger;
pub mod offers;

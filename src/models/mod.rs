pub mod chatmodel;
pub mod ledgermodel;
pub mod offermodel;
pub mod usermodel;

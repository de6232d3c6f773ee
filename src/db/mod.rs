pub mod chatdb;
pub mod db;
pub mod ledgerdb;
pub mod offerdb;
pub mod userdb;

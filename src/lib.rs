pub mod cards;
pub mod chain;
pub mod credential;
pub mod engine;
pub mod history;
pub mod ledger;
pub mod limiter;
pub mod lobby;
pub mod protocol;
pub mod server;
pub mod showdown;
pub mod signing;
pub mod table;

pub mod test_utils;

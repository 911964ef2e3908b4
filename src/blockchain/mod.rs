pub mod ledger_client;
pub mod networks;

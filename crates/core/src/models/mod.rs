pub mod asset;
pub mod dividend;
pub mod ledger;
pub mod position;
pub mod price;
pub mod schema;
pub mod settings;
pub mod transaction;

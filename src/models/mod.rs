pub mod ledger;
pub mod notification;
pub mod performance;
pub mod shipment;
pub mod tier;
pub mod user;
pub mod verification;

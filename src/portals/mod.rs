pub mod delaware;
pub mod dsc;
pub mod erp;
pub mod forms;
pub mod fsf;

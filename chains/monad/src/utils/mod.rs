pub mod amount;
pub mod balance;
pub mod display;
pub mod gas;
pub mod http;
pub mod tx;

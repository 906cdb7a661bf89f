pub mod liquidation;
pub mod tables;

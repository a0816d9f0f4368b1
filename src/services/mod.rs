pub mod holidays;
pub mod quote;

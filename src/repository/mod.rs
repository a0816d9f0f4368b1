pub mod pricing_config;
pub mod table_service;

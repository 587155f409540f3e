pub mod accounting_service;
pub mod aggregation_service;
pub mod loader_service;
pub mod resample_service;
pub mod valuation_service;

pub mod cached;
pub mod registry;
pub mod traits;

// API provider implementations
#[cfg(not(target_arch = "wasm32"))]
pub mod cvm;
#[cfg(not(target_arch = "wasm32"))]
pub mod mfinance;
#[cfg(not(target_arch = "wasm32"))]
pub mod yahoo_finance;

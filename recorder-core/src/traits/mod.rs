pub mod capture_backend;
pub mod filter;

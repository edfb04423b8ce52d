//! External data providers
//!
//! Narrow interfaces over the financial-data and web-search collaborators,
//! with HTTP-backed implementations configured from the environment and
//! mocks for development & testing.

pub mod finance;
pub mod search;

pub use finance::{FinanceAnswer, FinanceProvider, HttpFinanceProvider, MockFinanceProvider};
pub use search::{GoogleSearchProvider, MockSearchProvider, SearchHit, SearchProvider};

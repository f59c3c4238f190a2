//! Data models for BookVault

pub mod book;
pub mod loan;
pub mod page;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookSummary};
pub use loan::{BorrowOutcome, BorrowerRef, LendingPolicy, Loan, ReturnOutcome};
pub use page::{PageRequest, PaginatedResponse};
pub use user::{Role, User, UserClaims, UserResponse};

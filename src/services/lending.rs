//! Lending service: borrow, reserve, return, inventory and fines
//!
//! Each operation is one unit of work on the record store: lock the book,
//! apply the ledger transition, save, commit. Any error before commit drops
//! the transaction and leaves the stored book untouched. Callers are expected
//! to be authorized already; no role checks happen here.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        book::Book,
        loan::{BorrowOutcome, BorrowerRef, LendingPolicy},
    },
    repository::ledger::LedgerStore,
};

/// Confirmation of a lending operation
#[derive(Debug, Clone)]
pub struct LendingReceipt {
    pub message: String,
    pub book: Book,
    pub due_date: Option<DateTime<Utc>>,
    pub queue_position: Option<usize>,
    pub fine_charged: i64,
}

impl LendingReceipt {
    fn new(message: String, book: Book) -> Self {
        Self {
            message,
            book,
            due_date: None,
            queue_position: None,
            fine_charged: 0,
        }
    }
}

/// One fine charged by an overdue sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FineCharge {
    pub book_id: Uuid,
    pub borrower: BorrowerRef,
    pub amount: i64,
}

#[derive(Clone)]
pub struct LendingService {
    store: Arc<dyn LedgerStore>,
    policy: LendingPolicy,
}

impl LendingService {
    pub fn new(store: Arc<dyn LedgerStore>, policy: LendingPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> LendingPolicy {
        self.policy
    }

    /// Due date of a loan starting now
    pub fn calculate_due_date(&self) -> DateTime<Utc> {
        self.policy.due_date_from(Utc::now())
    }

    /// Current lending state of a book (plain read, no row lock)
    pub async fn get_ledger(&self, book_key: &str) -> AppResult<Book> {
        self.store.find_book(book_key).await
    }

    pub async fn is_available(&self, book_key: &str) -> AppResult<bool> {
        Ok(self.get_ledger(book_key).await?.is_available())
    }

    /// Add or withdraw copies; added copies serve the reservation queue first
    pub async fn update_copies(&self, book_key: &str, delta: i32) -> AppResult<LendingReceipt> {
        let mut tx = self.store.begin().await?;
        let mut book = tx.lock_book(book_key).await?;

        let promoted = book.update_copies(delta, &self.policy, Utc::now())?;

        tx.save_book(&book).await?;
        tx.commit().await?;

        tracing::info!(
            book_id = %book.id,
            delta,
            total_copies = book.total_copies,
            promoted = promoted.len(),
            "Copies updated"
        );

        let message = format!(
            "{} now has {} of {} copies available",
            book.title, book.copies_available, book.total_copies
        );
        Ok(LendingReceipt::new(message, book))
    }

    /// Borrow a copy, or join the reservation queue if none is left
    pub async fn borrow_book(&self, book_key: &str, borrower_id: Uuid) -> AppResult<LendingReceipt> {
        let mut tx = self.store.begin().await?;
        let mut book = tx.lock_book(book_key).await?;
        let borrower = tx.find_borrower(borrower_id).await?;

        let outcome = book.borrow_book(borrower.clone(), &self.policy, Utc::now())?;

        tx.save_book(&book).await?;
        tx.commit().await?;

        let receipt = match outcome {
            BorrowOutcome::Borrowed { due_date } => {
                tracing::info!(book_id = %book.id, borrower_id = %borrower.id, %due_date, "Book borrowed");
                let message = format!("{} borrowed {}", borrower.username, book.title);
                LendingReceipt {
                    due_date: Some(due_date),
                    ..LendingReceipt::new(message, book)
                }
            }
            BorrowOutcome::Queued { position } => {
                tracing::info!(book_id = %book.id, borrower_id = %borrower.id, position, "Borrower queued");
                let message = format!(
                    "{} not available for borrowing. {} added to reservation queue",
                    book.title, borrower.username
                );
                LendingReceipt {
                    queue_position: Some(position),
                    ..LendingReceipt::new(message, book)
                }
            }
            BorrowOutcome::AlreadyQueued { position } => {
                let message = format!(
                    "{} not available for borrowing. {} is already in the reservation queue at position {}",
                    book.title, borrower.username, position
                );
                LendingReceipt {
                    queue_position: Some(position),
                    ..LendingReceipt::new(message, book)
                }
            }
        };

        Ok(receipt)
    }

    /// Join the reservation queue of an unavailable book
    pub async fn reserve_book(&self, book_key: &str, borrower_id: Uuid) -> AppResult<LendingReceipt> {
        let mut tx = self.store.begin().await?;
        let mut book = tx.lock_book(book_key).await?;
        let borrower = tx.find_borrower(borrower_id).await?;

        if !book.reserve_book(borrower.clone(), Utc::now())? {
            let message = format!("{} is available, borrow it instead", book.title);
            return Ok(LendingReceipt::new(message, book));
        }

        tx.save_book(&book).await?;
        tx.commit().await?;

        let position = book.queue_position(borrower.id);
        tracing::info!(book_id = %book.id, borrower_id = %borrower.id, ?position, "Book reserved");

        let message = format!(
            "{} added to reservation queue for {}",
            borrower.username, book.title
        );
        Ok(LendingReceipt {
            queue_position: position,
            ..LendingReceipt::new(message, book)
        })
    }

    /// Return a borrowed copy, charging overdue fines
    pub async fn return_book(&self, book_key: &str, borrower_id: Uuid) -> AppResult<LendingReceipt> {
        let mut tx = self.store.begin().await?;
        let mut book = tx.lock_book(book_key).await?;
        let borrower = tx.find_borrower(borrower_id).await?;

        let outcome = book.return_book(borrower.id, &self.policy, Utc::now())?;

        tx.save_book(&book).await?;
        tx.commit().await?;

        tracing::info!(
            book_id = %book.id,
            borrower_id = %borrower.id,
            fine = outcome.fine_charged,
            "Book returned"
        );
        if let Some(ref next) = outcome.promoted {
            tracing::info!(book_id = %book.id, borrower_id = %next.id, "Reserved copy assigned");
        }

        let message = format!("{} returned {}", borrower.username, book.title);
        Ok(LendingReceipt {
            fine_charged: outcome.fine_charged,
            ..LendingReceipt::new(message, book)
        })
    }

    /// Charge fines on every overdue loan, one transaction per book
    pub async fn assess_overdue_fines(&self) -> AppResult<Vec<FineCharge>> {
        let now = Utc::now();
        let book_ids = self.store.overdue_book_ids(now).await?;
        let mut charges = Vec::new();

        for book_id in book_ids {
            let mut tx = self.store.begin().await?;
            let mut book = tx.lock_book(&book_id.to_string()).await?;

            let charged = book.assess_fines(&self.policy, now);
            if charged.is_empty() {
                continue;
            }

            tx.save_book(&book).await?;
            tx.commit().await?;

            for (borrower, amount) in charged {
                tracing::info!(book_id = %book.id, borrower_id = %borrower.id, amount, "Fine charged");
                charges.push(FineCharge {
                    book_id: book.id,
                    borrower,
                    amount,
                });
            }
        }

        Ok(charges)
    }

    /// Clear the accrued fine of a borrower on a book
    pub async fn clear_fine(&self, book_key: &str, borrower_id: Uuid) -> AppResult<i64> {
        let mut tx = self.store.begin().await?;
        let mut book = tx.lock_book(book_key).await?;

        let cleared = book.clear_fine(borrower_id)?;

        tx.save_book(&book).await?;
        tx.commit().await?;

        tracing::info!(book_id = %book.id, %borrower_id, cleared, "Fine cleared");
        Ok(cleared)
    }
}

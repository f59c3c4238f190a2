//! Transactional record store for the lending ledger
//!
//! Every ledger operation runs inside one `LedgerTx`: the book row is locked
//! with `SELECT ... FOR UPDATE` when loaded, so concurrent borrows of the same
//! title are serialized. Dropping a transaction without `commit` rolls back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, Pool, Postgres, Transaction};
use uuid::Uuid;

use super::books::{BooksRepository, BOOK_KEY_CLAUSE, BOOK_SELECT};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookRow},
        loan::BorrowerRef,
    },
};

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>>;

    /// Read a book by UUID or ISBN without locking it
    async fn find_book(&self, id_or_isbn: &str) -> AppResult<Book>;

    /// Ids of books holding at least one loan due before `now`
    async fn overdue_book_ids(&self, now: DateTime<Utc>) -> AppResult<Vec<Uuid>>;
}

#[async_trait]
pub trait LedgerTx: Send {
    /// Load a book by UUID or ISBN and hold it until commit or rollback
    async fn lock_book(&mut self, id_or_isbn: &str) -> AppResult<Book>;

    async fn find_borrower(&mut self, borrower_id: Uuid) -> AppResult<BorrowerRef>;

    /// Persist copy counts, loans, queue, history and fines of a locked book
    async fn save_book(&mut self, book: &Book) -> AppResult<()>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}

#[derive(Clone)]
pub struct PgLedgerStore {
    pool: Pool<Postgres>,
    books: BooksRepository,
}

impl PgLedgerStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: BooksRepository::new(pool.clone()),
            pool,
        }
    }
}

pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerTx { tx }))
    }

    async fn find_book(&self, id_or_isbn: &str) -> AppResult<Book> {
        self.books.get_by_id_or_isbn(id_or_isbn).await
    }

    async fn overdue_book_ids(&self, now: DateTime<Utc>) -> AppResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT b.id FROM books b
            WHERE EXISTS (
                SELECT 1 FROM jsonb_array_elements(b.borrowers) AS loan
                WHERE (loan->>'due_date')::timestamptz < $1
            )
            ORDER BY b.id
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn lock_book(&mut self, id_or_isbn: &str) -> AppResult<Book> {
        let query = format!("{} {} FOR UPDATE OF b", BOOK_SELECT, BOOK_KEY_CLAUSE);
        let row = sqlx::query_as::<_, BookRow>(&query)
            .bind(Uuid::parse_str(id_or_isbn).ok())
            .bind(id_or_isbn)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id_or_isbn)))?;

        Ok(row.into())
    }

    async fn find_borrower(&mut self, borrower_id: Uuid) -> AppResult<BorrowerRef> {
        let (id, username) = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT id, username FROM users WHERE id = $1",
        )
        .bind(borrower_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Borrower {} not found", borrower_id)))?;

        Ok(BorrowerRef { id, username })
    }

    async fn save_book(&mut self, book: &Book) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE books SET
                copies_available = $2,
                total_copies = $3,
                borrowers = $4,
                reservation_queue = $5,
                history = $6,
                fine_details = $7,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(book.id)
        .bind(book.copies_available)
        .bind(book.total_copies)
        .bind(Json(&book.borrowers))
        .bind(Json(&book.reservation_queue))
        .bind(Json(&book.history))
        .bind(Json(&book.fine_details))
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

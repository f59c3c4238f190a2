//! Catalog management service

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookQuery, BookSummary, CreateBook, UpdateBook},
        page::PageRequest,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Search books with filters and pagination
    pub async fn search_books(&self, query: &BookQuery) -> AppResult<(Vec<BookSummary>, i64, PageRequest)> {
        let page = PageRequest::new(query.page, query.limit)?;
        let (books, total) = self.repository.books.search(query, page).await?;
        Ok((books, total, page))
    }

    /// Get book by UUID or ISBN with its lending details
    pub async fn get_book(&self, id_or_isbn: &str) -> AppResult<Book> {
        self.repository.books.get_by_id_or_isbn(id_or_isbn).await
    }

    /// Add a title with `total_copies` copies, all available
    pub async fn add_book(&self, book: CreateBook) -> AppResult<Book> {
        book.validate()?;

        if self
            .repository
            .books
            .title_or_isbn_exists(Some(&book.title), Some(&book.isbn), None)
            .await?
        {
            return Err(AppError::Conflict(
                "A book with this title or ISBN already exists".to_string(),
            ));
        }

        let created = self.repository.books.create(&book).await?;
        tracing::info!(book_id = %created.id, copies = created.total_copies, "Book added");
        Ok(created)
    }

    /// Update book metadata
    pub async fn update_book(&self, id_or_isbn: &str, update: UpdateBook) -> AppResult<Book> {
        update.validate()?;

        let existing = self.repository.books.get_by_id_or_isbn(id_or_isbn).await?;

        if (update.title.is_some() || update.isbn.is_some())
            && self
                .repository
                .books
                .title_or_isbn_exists(update.title.as_deref(), update.isbn.as_deref(), Some(existing.id))
                .await?
        {
            return Err(AppError::Conflict(
                "A book with this title or ISBN already exists".to_string(),
            ));
        }

        self.repository.books.update(existing.id, &update).await
    }

    /// Delete a book and its lending state
    pub async fn delete_book(&self, id_or_isbn: &str) -> AppResult<()> {
        let existing = self.repository.books.get_by_id_or_isbn(id_or_isbn).await?;
        self.repository.books.delete(existing.id).await?;
        tracing::info!(book_id = %existing.id, "Book deleted");
        Ok(())
    }
}

//! Books repository for catalog database operations

use sqlx::{PgConnection, Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookQuery, BookRow, BookSummary, CreateBook, UpdateBook},
        page::PageRequest,
    },
};

/// Column list producing a `BookRow`; callers append the WHERE clause
pub(crate) const BOOK_SELECT: &str = r#"
    SELECT b.id, b.title, b.isbn, b.authors, b.publishers, b.image, b.year,
           c.name AS category,
           ARRAY(
               SELECT g.name FROM genres g
               JOIN book_genres bg ON bg.genre_id = g.id
               WHERE bg.book_id = b.id
               ORDER BY g.name
           ) AS genres,
           b.copies_available, b.total_copies,
           b.borrowers, b.reservation_queue, b.history, b.fine_details,
           b.created_at, b.updated_at
    FROM books b
    LEFT JOIN categories c ON c.id = b.category_id
"#;

/// WHERE clause matching a book by UUID or ISBN ($1 = id, $2 = isbn)
pub(crate) const BOOK_KEY_CLAUSE: &str = "WHERE (b.id = $1 OR b.isbn = $2)";

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by UUID or by ISBN
    pub async fn get_by_id_or_isbn(&self, id_or_isbn: &str) -> AppResult<Book> {
        let query = format!("{} {}", BOOK_SELECT, BOOK_KEY_CLAUSE);
        let row = sqlx::query_as::<_, BookRow>(&query)
            .bind(Uuid::parse_str(id_or_isbn).ok())
            .bind(id_or_isbn)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id_or_isbn)))?;

        Ok(row.into())
    }

    /// Search books with optional filters and pagination
    pub async fn search(
        &self,
        query: &BookQuery,
        page: PageRequest,
    ) -> AppResult<(Vec<BookSummary>, i64)> {
        let search = query.search.as_deref().map(contains_pattern);

        let where_clause = r#"
            WHERE ($1::text IS NULL
                   OR LOWER(b.title) LIKE $1 ESCAPE '\'
                   OR LOWER(b.isbn) LIKE $1 ESCAPE '\'
                   OR EXISTS (SELECT 1 FROM unnest(b.authors) a WHERE LOWER(a) LIKE $1 ESCAPE '\'))
              AND ($2::text IS NULL OR LOWER(c.name) = LOWER($2))
              AND ($3::text IS NULL OR EXISTS (
                    SELECT 1 FROM book_genres bg JOIN genres g ON g.id = bg.genre_id
                    WHERE bg.book_id = b.id AND LOWER(g.name) = LOWER($3)))
        "#;

        let count_query = format!(
            "SELECT COUNT(*) FROM books b LEFT JOIN categories c ON c.id = b.category_id {}",
            where_clause
        );
        let total: i64 = sqlx::query_scalar(&count_query)
            .bind(&search)
            .bind(&query.category)
            .bind(&query.genre)
            .fetch_one(&self.pool)
            .await?;

        let select_query = format!(
            r#"
            SELECT b.id, b.title, b.isbn, b.authors, b.year,
                   c.name AS category,
                   ARRAY(
                       SELECT g.name FROM genres g
                       JOIN book_genres bg ON bg.genre_id = g.id
                       WHERE bg.book_id = b.id
                       ORDER BY g.name
                   ) AS genres,
                   b.copies_available, b.total_copies
            FROM books b
            LEFT JOIN categories c ON c.id = b.category_id
            {}
            ORDER BY b.title
            LIMIT $4 OFFSET $5
            "#,
            where_clause
        );

        let books = sqlx::query_as::<_, BookSummary>(&select_query)
            .bind(&search)
            .bind(&query.category)
            .bind(&query.genre)
            .bind(page.limit)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok((books, total))
    }

    /// Check whether another book already uses this title or ISBN
    pub async fn title_or_isbn_exists(
        &self,
        title: Option<&str>,
        isbn: Option<&str>,
        exclude_id: Option<Uuid>,
    ) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM books
                WHERE (LOWER(title) = LOWER($1) OR isbn = $2)
                  AND ($3::uuid IS NULL OR id != $3)
            )
            "#,
        )
        .bind(title)
        .bind(isbn)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Create a book with its category and genres (get-or-create by name)
    pub async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let category_id = match book.category.as_deref() {
            Some(name) => Some(get_or_create_category(&mut tx, name).await?),
            None => None,
        };

        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO books (
                title, isbn, authors, publishers, image, year, category_id,
                copies_available, total_copies
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING id
            "#,
        )
        .bind(&book.title)
        .bind(&book.isbn)
        .bind(&book.authors)
        .bind(&book.publishers)
        .bind(&book.image)
        .bind(book.year)
        .bind(category_id)
        .bind(book.total_copies)
        .fetch_one(&mut *tx)
        .await?;

        set_genres(&mut tx, id, &book.genres).await?;

        tx.commit().await?;

        self.get_by_id_or_isbn(&id.to_string()).await
    }

    /// Update book metadata
    pub async fn update(&self, id: Uuid, book: &UpdateBook) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let category_id = match book.category.as_deref() {
            Some(name) => Some(get_or_create_category(&mut tx, name).await?),
            None => None,
        };

        let result = sqlx::query(
            r#"
            UPDATE books SET
                title = COALESCE($2, title),
                isbn = COALESCE($3, isbn),
                authors = COALESCE($4, authors),
                publishers = COALESCE($5, publishers),
                image = COALESCE($6, image),
                year = COALESCE($7, year),
                category_id = COALESCE($8, category_id),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&book.title)
        .bind(&book.isbn)
        .bind(&book.authors)
        .bind(&book.publishers)
        .bind(&book.image)
        .bind(book.year)
        .bind(category_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book {} not found", id)));
        }

        if let Some(ref genres) = book.genres {
            sqlx::query("DELETE FROM book_genres WHERE book_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            set_genres(&mut tx, id, genres).await?;
        }

        tx.commit().await?;

        self.get_by_id_or_isbn(&id.to_string()).await
    }

    /// Delete a book
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book {} not found", id)));
        }

        Ok(())
    }
}

/// Lowercased `%term%` pattern with LIKE wildcards in the term escaped
fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.to_lowercase().chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

async fn get_or_create_category(conn: &mut PgConnection, name: &str) -> AppResult<Uuid> {
    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO categories (name) VALUES ($1)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(name.trim())
    .fetch_one(conn)
    .await?;

    Ok(id)
}

async fn get_or_create_genre(conn: &mut PgConnection, name: &str) -> AppResult<Uuid> {
    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO genres (name) VALUES ($1)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(name.trim())
    .fetch_one(conn)
    .await?;

    Ok(id)
}

async fn set_genres(conn: &mut PgConnection, book_id: Uuid, genres: &[String]) -> AppResult<()> {
    for name in genres {
        let genre_id = get_or_create_genre(&mut *conn, name).await?;
        sqlx::query(
            "INSERT INTO book_genres (book_id, genre_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(book_id)
        .bind(genre_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

//! Book model and the lending ledger carried by each title

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::loan::{
    BorrowOutcome, BorrowerRef, HistoryEntry, LedgerAction, LendingPolicy, Loan, ReturnOutcome,
};
use crate::error::{AppError, AppResult};

/// Internal row structure for database queries (ledger columns are JSONB)
#[derive(Debug, Clone, FromRow)]
pub struct BookRow {
    id: Uuid,
    title: String,
    isbn: String,
    authors: Vec<String>,
    publishers: Vec<String>,
    image: String,
    year: i32,
    category: Option<String>,
    genres: Vec<String>,
    copies_available: i32,
    total_copies: i32,
    borrowers: Json<Vec<Loan>>,
    reservation_queue: Json<Vec<BorrowerRef>>,
    history: Json<Vec<HistoryEntry>>,
    fine_details: Json<BTreeMap<Uuid, i64>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BookRow> for Book {
    fn from(row: BookRow) -> Self {
        Book {
            id: row.id,
            title: row.title,
            isbn: row.isbn,
            authors: row.authors,
            publishers: row.publishers,
            image: row.image,
            year: row.year,
            category: row.category,
            genres: row.genres,
            copies_available: row.copies_available,
            total_copies: row.total_copies,
            borrowers: row.borrowers.0,
            reservation_queue: row.reservation_queue.0,
            history: row.history.0,
            fine_details: row.fine_details.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Full book model including its lending state
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub isbn: String,
    pub authors: Vec<String>,
    pub publishers: Vec<String>,
    /// Cover image reference
    pub image: String,
    pub year: i32,
    pub category: Option<String>,
    pub genres: Vec<String>,
    pub copies_available: i32,
    pub total_copies: i32,
    /// Active loans, oldest first
    pub borrowers: Vec<Loan>,
    /// FIFO waiting list for the next free copy
    pub reservation_queue: Vec<BorrowerRef>,
    pub history: Vec<HistoryEntry>,
    /// Accrued fine per borrower id
    #[schema(value_type = Object)]
    pub fine_details: BTreeMap<Uuid, i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Short book representation for lists
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookSummary {
    pub id: Uuid,
    pub title: String,
    pub isbn: String,
    pub authors: Vec<String>,
    pub year: i32,
    pub category: Option<String>,
    pub genres: Vec<String>,
    pub copies_available: i32,
    pub total_copies: i32,
}

/// Book list query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    /// Search in title, ISBN and authors
    pub search: Option<String>,
    pub category: Option<String>,
    pub genre: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Add book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 100, message = "Title must be 1-100 characters"))]
    pub title: String,
    #[validate(length(min = 1, message = "At least one author is required"))]
    pub authors: Vec<String>,
    #[serde(default)]
    pub publishers: Vec<String>,
    #[validate(length(max = 1024, message = "Image reference is too long"))]
    pub image: String,
    #[validate(range(min = 0, max = 9999, message = "Invalid publication year"))]
    pub year: i32,
    #[validate(length(min = 10, max = 17, message = "Invalid ISBN"))]
    pub isbn: String,
    pub category: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[validate(range(min = 0, message = "total_copies cannot be negative"))]
    pub total_copies: i32,
}

/// Update book metadata request (copy counts go through the copies endpoint)
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 100, message = "Title must be 1-100 characters"))]
    pub title: Option<String>,
    pub authors: Option<Vec<String>>,
    pub publishers: Option<Vec<String>>,
    #[validate(length(max = 1024, message = "Image reference is too long"))]
    pub image: Option<String>,
    #[validate(range(min = 0, max = 9999, message = "Invalid publication year"))]
    pub year: Option<i32>,
    #[validate(length(min = 10, max = 17, message = "Invalid ISBN"))]
    pub isbn: Option<String>,
    pub category: Option<String>,
    pub genres: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Lending ledger
// ---------------------------------------------------------------------------

impl Book {
    pub fn is_available(&self) -> bool {
        self.copies_available > 0
    }

    pub fn calculate_due_date(&self, policy: &LendingPolicy, now: DateTime<Utc>) -> DateTime<Utc> {
        policy.due_date_from(now)
    }

    pub fn has_loan(&self, borrower_id: Uuid) -> bool {
        self.borrowers.iter().any(|loan| loan.borrower.id == borrower_id)
    }

    /// 1-based position of a borrower in the reservation queue
    pub fn queue_position(&self, borrower_id: Uuid) -> Option<usize> {
        self.reservation_queue
            .iter()
            .position(|queued| queued.id == borrower_id)
            .map(|index| index + 1)
    }

    pub fn fine_for(&self, borrower_id: Uuid) -> i64 {
        self.fine_details.get(&borrower_id).copied().unwrap_or(0)
    }

    /// Add (or withdraw, with a negative delta) copies of this title.
    ///
    /// Copies on loan can't be withdrawn. Added copies go to waiting
    /// borrowers first; the promoted borrowers are returned.
    pub fn update_copies(
        &mut self,
        delta: i32,
        policy: &LendingPolicy,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<BorrowerRef>> {
        let available = self.copies_available.checked_add(delta);
        let total = self.total_copies.checked_add(delta);

        let (available, total) = match (available, total) {
            (Some(available), Some(total)) if available >= 0 && total >= 0 => (available, total),
            _ => {
                return Err(AppError::InvalidState(format!(
                    "Cannot adjust '{}' by {}: {} of {} copies on shelf",
                    self.title, delta, self.copies_available, self.total_copies
                )))
            }
        };

        self.copies_available = available;
        self.total_copies = total;

        Ok(self.serve_queue(policy, now))
    }

    /// Lend a copy, or queue the borrower when none is left
    pub fn borrow_book(
        &mut self,
        borrower: BorrowerRef,
        policy: &LendingPolicy,
        now: DateTime<Utc>,
    ) -> AppResult<BorrowOutcome> {
        if self.has_loan(borrower.id) {
            return Err(AppError::Conflict(format!(
                "{} already borrowed {}",
                borrower.username, self.title
            )));
        }

        if self.is_available() {
            let due_date = self.lend(borrower, policy, now);
            return Ok(BorrowOutcome::Borrowed { due_date });
        }

        if let Some(position) = self.queue_position(borrower.id) {
            return Ok(BorrowOutcome::AlreadyQueued { position });
        }

        self.reserve_book(borrower, now)?;
        Ok(BorrowOutcome::Queued {
            position: self.reservation_queue.len(),
        })
    }

    /// Join the reservation queue. Returns false if a copy is free.
    pub fn reserve_book(&mut self, borrower: BorrowerRef, now: DateTime<Utc>) -> AppResult<bool> {
        if self.is_available() {
            return Ok(false);
        }

        if self.has_loan(borrower.id) {
            return Err(AppError::Conflict(format!(
                "{} already has {} on loan",
                borrower.username, self.title
            )));
        }

        if self.queue_position(borrower.id).is_some() {
            return Err(AppError::Conflict(format!(
                "{} is already in the reservation queue for {}",
                borrower.username, self.title
            )));
        }

        self.history.push(HistoryEntry {
            action: LedgerAction::Reserved,
            borrower: borrower.clone(),
            at: now,
            due_date: None,
        });
        self.reservation_queue.push(borrower);

        Ok(true)
    }

    /// Close the borrower's loan, charging any overdue fine, and hand the
    /// copy to the head of the reservation queue.
    pub fn return_book(
        &mut self,
        borrower_id: Uuid,
        policy: &LendingPolicy,
        now: DateTime<Utc>,
    ) -> AppResult<ReturnOutcome> {
        let index = self
            .borrowers
            .iter()
            .position(|loan| loan.borrower.id == borrower_id)
            .ok_or_else(|| {
                AppError::InvalidState(format!(
                    "Borrower {} did not borrow {}",
                    borrower_id, self.title
                ))
            })?;

        let fine_charged = self.charge_fine(index, policy, now);
        let loan = self.borrowers.remove(index);
        self.copies_available += 1;

        self.history.push(HistoryEntry {
            action: LedgerAction::Returned,
            borrower: loan.borrower,
            at: now,
            due_date: Some(loan.due_date),
        });

        let promoted = self.serve_queue(policy, now).into_iter().next();

        Ok(ReturnOutcome {
            fine_charged,
            promoted,
        })
    }

    /// Charge every overdue loan for the days not yet fined
    pub fn assess_fines(
        &mut self,
        policy: &LendingPolicy,
        now: DateTime<Utc>,
    ) -> Vec<(BorrowerRef, i64)> {
        let mut charged = Vec::new();
        for index in 0..self.borrowers.len() {
            let amount = self.charge_fine(index, policy, now);
            if amount > 0 {
                charged.push((self.borrowers[index].borrower.clone(), amount));
            }
        }
        charged
    }

    /// Remove the accrued fine of a borrower, returning the cleared amount
    pub fn clear_fine(&mut self, borrower_id: Uuid) -> AppResult<i64> {
        self.fine_details.remove(&borrower_id).ok_or_else(|| {
            AppError::NotFound(format!(
                "No fine recorded for borrower {} on {}",
                borrower_id, self.title
            ))
        })
    }

    fn lend(&mut self, borrower: BorrowerRef, policy: &LendingPolicy, now: DateTime<Utc>) -> DateTime<Utc> {
        let due_date = self.calculate_due_date(policy, now);
        self.copies_available -= 1;
        self.history.push(HistoryEntry {
            action: LedgerAction::Borrowed,
            borrower: borrower.clone(),
            at: now,
            due_date: Some(due_date),
        });
        self.borrowers.push(Loan {
            borrower,
            borrowed_at: now,
            due_date,
            fined_days: 0,
        });
        due_date
    }

    fn serve_queue(&mut self, policy: &LendingPolicy, now: DateTime<Utc>) -> Vec<BorrowerRef> {
        let mut promoted = Vec::new();
        while self.is_available() && !self.reservation_queue.is_empty() {
            let next = self.reservation_queue.remove(0);
            self.lend(next.clone(), policy, now);
            promoted.push(next);
        }
        promoted
    }

    fn charge_fine(&mut self, index: usize, policy: &LendingPolicy, now: DateTime<Utc>) -> i64 {
        let loan = &mut self.borrowers[index];
        let overdue_days = loan.overdue_days(now);
        let unfined_days = overdue_days - loan.fined_days;
        if unfined_days <= 0 || policy.fine_rate_per_day <= 0 {
            return 0;
        }

        let amount = unfined_days * policy.fine_rate_per_day;
        loan.fined_days = overdue_days;
        *self.fine_details.entry(loan.borrower.id).or_insert(0) += amount;
        amount
    }
}

#[cfg(test)]
pub(crate) fn test_book(title: &str, copies: i32) -> Book {
    let now = Utc::now();
    Book {
        id: Uuid::new_v4(),
        title: title.to_string(),
        isbn: format!("978{:010}", now.timestamp_subsec_nanos()),
        authors: vec!["Chinua Achebe".to_string()],
        publishers: vec!["Heinemann".to_string()],
        image: "covers/test.png".to_string(),
        year: 1958,
        category: Some("Fiction".to_string()),
        genres: vec!["Classic".to_string()],
        copies_available: copies,
        total_copies: copies,
        borrowers: Vec::new(),
        reservation_queue: Vec::new(),
        history: Vec::new(),
        fine_details: BTreeMap::new(),
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn borrower(name: &str) -> BorrowerRef {
        BorrowerRef {
            id: Uuid::new_v4(),
            username: name.to_string(),
        }
    }

    fn assert_consistent(book: &Book) {
        assert!(book.copies_available >= 0);
        assert!(book.copies_available <= book.total_copies);
        assert_eq!(
            book.copies_available as usize,
            book.total_copies as usize - book.borrowers.len()
        );
        if !book.reservation_queue.is_empty() {
            assert_eq!(book.copies_available, 0);
        }
    }

    #[test]
    fn test_borrow_available_copy() {
        let policy = LendingPolicy::default();
        let now = Utc::now();
        let mut book = test_book("Things Fall Apart", 2);
        let ada = borrower("ada");

        let outcome = book.borrow_book(ada.clone(), &policy, now).unwrap();

        assert_eq!(
            outcome,
            BorrowOutcome::Borrowed {
                due_date: now + Duration::days(14)
            }
        );
        assert_eq!(book.copies_available, 1);
        assert_eq!(book.borrowers.len(), 1);
        assert_eq!(book.borrowers[0].borrower, ada);
        assert_consistent(&book);
    }

    #[test]
    fn test_borrow_twice_is_conflict() {
        let policy = LendingPolicy::default();
        let now = Utc::now();
        let mut book = test_book("Arrow of God", 3);
        let ada = borrower("ada");

        book.borrow_book(ada.clone(), &policy, now).unwrap();
        let err = book.borrow_book(ada, &policy, now).unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(book.copies_available, 2);
        assert_eq!(book.borrowers.len(), 1);
    }

    #[test]
    fn test_borrow_unavailable_queues_once() {
        let policy = LendingPolicy::default();
        let now = Utc::now();
        let mut book = test_book("No Longer at Ease", 1);
        let ada = borrower("ada");
        let bola = borrower("bola");

        book.borrow_book(ada, &policy, now).unwrap();
        let first = book.borrow_book(bola.clone(), &policy, now).unwrap();
        let second = book.borrow_book(bola.clone(), &policy, now).unwrap();

        assert_eq!(first, BorrowOutcome::Queued { position: 1 });
        assert_eq!(second, BorrowOutcome::AlreadyQueued { position: 1 });
        assert_eq!(book.copies_available, 0);
        assert_eq!(book.reservation_queue, vec![bola]);
        assert_consistent(&book);
    }

    #[test]
    fn test_reserve_rules() {
        let now = Utc::now();
        let mut book = test_book("Anthills of the Savannah", 1);
        let ada = borrower("ada");
        let bola = borrower("bola");

        assert!(!book.reserve_book(ada.clone(), now).unwrap());
        assert!(book.reservation_queue.is_empty());

        book.borrow_book(ada.clone(), &LendingPolicy::default(), now).unwrap();
        assert!(book.reserve_book(bola.clone(), now).unwrap());

        let duplicate = book.reserve_book(bola, now).unwrap_err();
        assert!(matches!(duplicate, AppError::Conflict(_)));

        let holder = book.reserve_book(ada, now).unwrap_err();
        assert!(matches!(holder, AppError::Conflict(_)));
        assert_eq!(book.reservation_queue.len(), 1);
    }

    #[test]
    fn test_return_without_loan_changes_nothing() {
        let policy = LendingPolicy::default();
        let now = Utc::now();
        let mut book = test_book("A Man of the People", 1);
        book.borrow_book(borrower("ada"), &policy, now).unwrap();
        let before = book.clone();

        let err = book.return_book(Uuid::new_v4(), &policy, now).unwrap_err();

        assert!(matches!(err, AppError::InvalidState(_)));
        assert_eq!(book.copies_available, before.copies_available);
        assert_eq!(book.borrowers, before.borrowers);
        assert_eq!(book.history, before.history);
    }

    #[test]
    fn test_borrow_return_round_trip() {
        let policy = LendingPolicy::default();
        let now = Utc::now();
        let mut book = test_book("Girls at War", 2);
        let ada = borrower("ada");

        book.borrow_book(ada.clone(), &policy, now).unwrap();
        let outcome = book.return_book(ada.id, &policy, now).unwrap();

        assert_eq!(outcome.fine_charged, 0);
        assert_eq!(outcome.promoted, None);
        assert_eq!(book.copies_available, 2);
        assert!(book.borrowers.is_empty());
        assert_eq!(book.history.last().map(|h| h.action), Some(LedgerAction::Returned));

        let again = book.return_book(ada.id, &policy, now).unwrap_err();
        assert!(matches!(again, AppError::InvalidState(_)));
        assert_eq!(book.copies_available, 2);
    }

    #[test]
    fn test_return_hands_copy_to_queue_head() {
        let policy = LendingPolicy::default();
        let now = Utc::now();
        let mut book = test_book("Chike and the River", 1);
        let ada = borrower("ada");
        let bola = borrower("bola");
        let chidi = borrower("chidi");

        book.borrow_book(ada.clone(), &policy, now).unwrap();
        book.borrow_book(bola.clone(), &policy, now).unwrap();
        book.borrow_book(chidi.clone(), &policy, now).unwrap();
        assert_eq!(book.copies_available, 0);

        let later = now + Duration::days(2);
        let outcome = book.return_book(ada.id, &policy, later).unwrap();

        assert_eq!(outcome.promoted, Some(bola.clone()));
        assert_eq!(book.copies_available, 0);
        assert_eq!(book.borrowers.len(), 1);
        assert_eq!(book.borrowers[0].borrower, bola);
        assert_eq!(book.borrowers[0].due_date, later + Duration::days(14));
        assert_eq!(book.reservation_queue, vec![chidi]);
        assert_consistent(&book);
    }

    #[test]
    fn test_overdue_return_charges_fine() {
        let policy = LendingPolicy::default();
        let now = Utc::now();
        let mut book = test_book("Hopes and Impediments", 1);
        let ada = borrower("ada");

        book.borrow_book(ada.clone(), &policy, now - Duration::days(34))
            .unwrap();
        assert_eq!(book.borrowers[0].due_date, now - Duration::days(20));

        let outcome = book.return_book(ada.id, &policy, now).unwrap();

        assert_eq!(outcome.fine_charged, 200);
        assert_eq!(book.fine_for(ada.id), 200);
    }

    #[test]
    fn test_fines_accumulate_without_double_charge() {
        let policy = LendingPolicy::default();
        let start = Utc::now();
        let mut book = test_book("The Trouble with Nigeria", 1);
        let ada = borrower("ada");

        book.borrow_book(ada.clone(), &policy, start).unwrap();

        let day_17 = start + Duration::days(17);
        assert_eq!(book.assess_fines(&policy, day_17), vec![(ada.clone(), 30)]);
        assert!(book.assess_fines(&policy, day_17).is_empty());

        let day_20 = start + Duration::days(20);
        let outcome = book.return_book(ada.id, &policy, day_20).unwrap();
        assert_eq!(outcome.fine_charged, 30);
        assert_eq!(book.fine_for(ada.id), 60);

        assert_eq!(book.clear_fine(ada.id).unwrap(), 60);
        assert_eq!(book.fine_for(ada.id), 0);
        assert!(matches!(book.clear_fine(ada.id), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_update_copies_serves_queue() {
        let policy = LendingPolicy::default();
        let now = Utc::now();
        let mut book = test_book("Home and Exile", 1);
        let ada = borrower("ada");
        let bola = borrower("bola");
        let chidi = borrower("chidi");

        book.borrow_book(ada, &policy, now).unwrap();
        book.borrow_book(bola.clone(), &policy, now).unwrap();
        book.borrow_book(chidi.clone(), &policy, now).unwrap();

        let promoted = book.update_copies(3, &policy, now).unwrap();

        assert_eq!(promoted, vec![bola, chidi]);
        assert_eq!(book.total_copies, 4);
        assert_eq!(book.copies_available, 1);
        assert!(book.reservation_queue.is_empty());
        assert_consistent(&book);
    }

    #[test]
    fn test_update_copies_cannot_withdraw_loaned_copies() {
        let policy = LendingPolicy::default();
        let now = Utc::now();
        let mut book = test_book("There Was a Country", 2);
        book.borrow_book(borrower("ada"), &policy, now).unwrap();

        let err = book.update_copies(-2, &policy, now).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert_eq!(book.total_copies, 2);
        assert_eq!(book.copies_available, 1);

        book.update_copies(-1, &policy, now).unwrap();
        assert_eq!(book.total_copies, 1);
        assert_eq!(book.copies_available, 0);
        assert_consistent(&book);
    }

    #[test]
    fn test_single_copy_scenario() {
        let policy = LendingPolicy::default();
        let now = Utc::now();
        let mut book = test_book("Beware, Soul Brother", 1);
        let a = borrower("a");
        let b = borrower("b");

        book.borrow_book(a.clone(), &policy, now).unwrap();
        assert_eq!(book.copies_available, 0);

        assert_eq!(
            book.borrow_book(b.clone(), &policy, now).unwrap(),
            BorrowOutcome::Queued { position: 1 }
        );
        assert_eq!(book.reservation_queue, vec![b.clone()]);

        book.return_book(a.id, &policy, now).unwrap();
        assert_eq!(book.copies_available, 0);
        assert_eq!(book.borrowers.len(), 1);
        assert_eq!(book.borrowers[0].borrower, b);
        assert!(book.reservation_queue.is_empty());
    }

    #[test]
    fn test_random_sequence_keeps_invariants() {
        use rand::{rngs::StdRng, Rng, SeedableRng};

        let policy = LendingPolicy::default();
        let mut rng = StdRng::seed_from_u64(7);
        let mut now = Utc::now();
        let mut book = test_book("Collected Stories", 2);
        let people: Vec<BorrowerRef> = (0..5).map(|i| borrower(&format!("user{}", i))).collect();

        for _ in 0..500 {
            now += Duration::hours(rng.gen_range(0..72));
            let who = people[rng.gen_range(0..people.len())].clone();
            let _ = match rng.gen_range(0..5) {
                0 | 1 => book.borrow_book(who, &policy, now).map(|_| ()),
                2 => book.return_book(who.id, &policy, now).map(|_| ()),
                3 => book.reserve_book(who, now).map(|_| ()),
                _ => book.update_copies(rng.gen_range(-1..=1), &policy, now).map(|_| ()),
            };
            assert_consistent(&book);
            for fined in book.fine_details.keys() {
                assert!(book
                    .history
                    .iter()
                    .any(|entry| entry.borrower.id == *fined && entry.due_date.is_some()));
            }
        }
    }
}

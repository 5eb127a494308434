//! Borrow, return, reservation and fine workflows

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use circulation_server::{
    config::CirculationConfig,
    models::{BorrowStatus, Caller, FineStatus, ReservationStatus, UserRole},
    repository::{memory::MemoryStore, Repository},
    services::{clock::test_clock, notifier::LogNotifier, Services},
    AppError,
};

use crate::{library, library_with_policy};

const ADMIN: Caller = Caller {
    user_id: 1000,
    role: UserRole::Admin,
};

#[tokio::test]
async fn last_copy_borrowed_then_next_member_gets_reservation() {
    let lib = library();
    let book_id = lib.add_book("isbn-a", 1).await;
    let u1 = Caller::member(1);
    let u2 = Caller::member(2);

    let borrow = lib.services.borrows.request_borrow(&u1, book_id).await.unwrap();
    assert_eq!(borrow.status, BorrowStatus::Borrowed);
    assert_eq!(borrow.due_date, borrow.borrow_date + Duration::days(14));
    assert_eq!(lib.available(book_id).await, 0);

    let err = lib.services.borrows.request_borrow(&u2, book_id).await.unwrap_err();
    let reservation_id = match err {
        AppError::Unavailable { book_id: b, reservation_id } => {
            assert_eq!(b, book_id);
            reservation_id
        }
        other => panic!("expected Unavailable, got {:?}", other),
    };

    let mine = lib.services.reservations.list_mine(&u2).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, reservation_id);
    assert_eq!(mine[0].book_id, book_id);
    assert_eq!(mine[0].status, ReservationStatus::Pending);
    assert_eq!(lib.available(book_id).await, 0);
}

#[tokio::test]
async fn repeated_unavailable_requests_keep_one_reservation() {
    let lib = library();
    let book_id = lib.add_book("isbn-a", 1).await;
    lib.services
        .borrows
        .request_borrow(&Caller::member(1), book_id)
        .await
        .unwrap();

    let first = lib.services.borrows.request_borrow(&Caller::member(2), book_id).await;
    let second = lib.services.borrows.request_borrow(&Caller::member(2), book_id).await;

    match (first, second) {
        (
            Err(AppError::Unavailable { reservation_id: a, .. }),
            Err(AppError::Unavailable { reservation_id: b, .. }),
        ) => assert_eq!(a, b),
        other => panic!("expected two Unavailable errors, got {:?}", other),
    }
    assert_eq!(
        lib.services.reservations.queue_for(&ADMIN, book_id).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn same_member_cannot_hold_two_copies() {
    let lib = library();
    let book_id = lib.add_book("isbn-a", 3).await;
    let member = Caller::member(1);

    lib.services.borrows.request_borrow(&member, book_id).await.unwrap();
    let err = lib.services.borrows.request_borrow(&member, book_id).await.unwrap_err();

    assert!(matches!(err, AppError::DuplicateActiveLoan { user_id: 1, .. }));
    assert_eq!(lib.available(book_id).await, 2);
    assert_eq!(lib.services.borrows.list_history(&member).await.unwrap().len(), 1);
}

#[tokio::test]
async fn three_days_late_costs_thirty() {
    let lib = library();
    let book_id = lib.add_book("isbn-a", 1).await;
    let borrow = lib
        .services
        .borrows
        .request_borrow(&Caller::member(1), book_id)
        .await
        .unwrap();

    lib.clock.set(borrow.due_date + Duration::days(3));
    let outcome = lib.services.borrows.return_book(&ADMIN, borrow.id).await.unwrap();

    assert_eq!(outcome.borrow.status, BorrowStatus::Returned);
    assert_eq!(outcome.borrow.return_date, Some(borrow.due_date + Duration::days(3)));
    assert_eq!(outcome.borrow.fine_amount, Decimal::from(30));

    let fines = lib
        .services
        .fines
        .for_borrow(&ADMIN, borrow.id)
        .await
        .unwrap();
    assert_eq!(fines.len(), 1);
    assert_eq!(fines[0].amount, Decimal::from(30));
    assert_eq!(fines[0].status, FineStatus::Unpaid);
    assert!(fines[0].payment_date.is_none());
    assert_eq!(lib.available(book_id).await, 1);
}

#[tokio::test]
async fn return_on_due_date_is_free() {
    let lib = library();
    let book_id = lib.add_book("isbn-a", 1).await;
    let borrow = lib
        .services
        .borrows
        .request_borrow(&Caller::member(1), book_id)
        .await
        .unwrap();

    lib.clock.set(borrow.due_date);
    let outcome = lib.services.borrows.return_book(&ADMIN, borrow.id).await.unwrap();

    assert_eq!(outcome.borrow.fine_amount, Decimal::ZERO);
    assert!(outcome.fine.is_none());
    assert!(lib
        .services
        .fines
        .for_borrow(&ADMIN, borrow.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn fine_uses_configured_rate() {
    let lib = library_with_policy(CirculationConfig {
        loan_period_days: 7,
        fine_rate_per_day: Decimal::new(150, 2),
    });
    let book_id = lib.add_book("isbn-a", 1).await;
    let borrow = lib
        .services
        .borrows
        .request_borrow(&Caller::member(1), book_id)
        .await
        .unwrap();
    assert_eq!(borrow.due_date - borrow.borrow_date, Duration::days(7));

    lib.clock.set(borrow.due_date + Duration::days(4) + Duration::hours(20));
    let outcome = lib.services.borrows.return_book(&ADMIN, borrow.id).await.unwrap();

    assert_eq!(outcome.borrow.fine_amount, Decimal::from(6));
}

#[tokio::test]
async fn paying_twice_is_a_no_op() {
    let lib = library();
    let book_id = lib.add_book("isbn-a", 1).await;
    let borrow = lib
        .services
        .borrows
        .request_borrow(&Caller::member(1), book_id)
        .await
        .unwrap();
    lib.clock.set(borrow.due_date + Duration::days(2));
    let fine = lib
        .services
        .borrows
        .return_book(&ADMIN, borrow.id)
        .await
        .unwrap()
        .fine
        .unwrap();

    lib.clock.advance(Duration::days(1));
    let paid = lib.services.fines.pay(&ADMIN, fine.id).await.unwrap();
    assert_eq!(paid.status, FineStatus::Paid);
    let paid_at = paid.payment_date.expect("payment date set");

    lib.clock.advance(Duration::days(1));
    let again = lib.services.fines.pay(&ADMIN, fine.id).await.unwrap();
    assert_eq!(again.status, FineStatus::Paid);
    assert_eq!(again.payment_date, Some(paid_at));

    let err = lib.services.fines.waive(&ADMIN, fine.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn waived_fine_cannot_be_paid() {
    let lib = library();
    let book_id = lib.add_book("isbn-a", 1).await;
    let borrow = lib
        .services
        .borrows
        .request_borrow(&Caller::member(1), book_id)
        .await
        .unwrap();
    lib.clock.set(borrow.due_date + Duration::days(5));
    let fine = lib
        .services
        .borrows
        .return_book(&ADMIN, borrow.id)
        .await
        .unwrap()
        .fine
        .unwrap();

    let waived = lib.services.fines.waive(&ADMIN, fine.id).await.unwrap();
    assert_eq!(waived.status, FineStatus::Waived);
    assert!(waived.payment_date.is_none());
    assert_eq!(
        lib.services.fines.waive(&ADMIN, fine.id).await.unwrap().status,
        FineStatus::Waived
    );
    assert!(matches!(
        lib.services.fines.pay(&ADMIN, fine.id).await,
        Err(AppError::Conflict(_))
    ));
}

#[tokio::test]
async fn fine_admin_checks() {
    let lib = library();
    assert!(matches!(
        lib.services.fines.pay(&Caller::member(1), 1).await,
        Err(AppError::Authorization(_))
    ));
    assert!(matches!(
        lib.services.fines.pay(&ADMIN, 12345).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn second_return_fails_and_changes_nothing() {
    let lib = library();
    let book_id = lib.add_book("isbn-a", 2).await;
    let borrow = lib
        .services
        .borrows
        .request_borrow(&Caller::member(1), book_id)
        .await
        .unwrap();
    lib.clock.set(borrow.due_date + Duration::days(1));
    lib.services.borrows.return_book(&ADMIN, borrow.id).await.unwrap();
    assert_eq!(lib.available(book_id).await, 2);

    lib.clock.advance(Duration::days(10));
    let err = lib.services.borrows.return_book(&ADMIN, borrow.id).await.unwrap_err();

    assert!(matches!(err, AppError::AlreadyReturned(id) if id == borrow.id));
    assert_eq!(lib.available(book_id).await, 2);
    let fines = lib.services.fines.for_borrow(&ADMIN, borrow.id).await.unwrap();
    assert_eq!(fines.len(), 1);
    assert_eq!(fines[0].amount, Decimal::from(10));
}

#[tokio::test]
async fn returning_unknown_borrow_is_not_found() {
    let lib = library();
    assert!(matches!(
        lib.services.borrows.return_book(&ADMIN, 77).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn reserved_member_borrowing_fulfils_reservation() {
    let lib = library();
    let book_id = lib.add_book("isbn-a", 1).await;
    let holder = Caller::member(1);
    let waiting = Caller::member(2);

    let borrow = lib.services.borrows.request_borrow(&holder, book_id).await.unwrap();
    let _ = lib.services.borrows.request_borrow(&waiting, book_id).await;

    let outcome = lib.services.borrows.return_book(&ADMIN, borrow.id).await.unwrap();
    let next = outcome.next_reservation.expect("waiting member surfaced");
    assert_eq!(next.user_id, 2);
    assert_eq!(next.status, ReservationStatus::Pending);
    assert_eq!(lib.available(book_id).await, 1);

    lib.services.borrows.request_borrow(&waiting, book_id).await.unwrap();

    let mine = lib.services.reservations.list_mine(&waiting).await.unwrap();
    assert_eq!(mine[0].status, ReservationStatus::Fulfilled);
    assert!(lib
        .services
        .reservations
        .queue_for(&ADMIN, book_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn queue_is_first_come_first_served() {
    let lib = library();
    let book_id = lib.add_book("isbn-a", 1).await;
    let borrow = lib
        .services
        .borrows
        .request_borrow(&Caller::member(1), book_id)
        .await
        .unwrap();

    for user_id in [5, 3, 4] {
        lib.clock.advance(Duration::minutes(1));
        let _ = lib
            .services
            .borrows
            .request_borrow(&Caller::member(user_id), book_id)
            .await;
    }

    let queue = lib.services.reservations.queue_for(&ADMIN, book_id).await.unwrap();
    let order: Vec<i32> = queue.iter().map(|r| r.user_id).collect();
    assert_eq!(order, vec![5, 3, 4]);

    let outcome = lib.services.borrows.return_book(&ADMIN, borrow.id).await.unwrap();
    assert_eq!(outcome.next_reservation.unwrap().user_id, 5);
}

#[tokio::test]
async fn cancelled_reservation_leaves_queue() {
    let lib = library();
    let book_id = lib.add_book("isbn-a", 1).await;
    lib.services
        .borrows
        .request_borrow(&Caller::member(1), book_id)
        .await
        .unwrap();
    let reservation_id = match lib
        .services
        .borrows
        .request_borrow(&Caller::member(2), book_id)
        .await
    {
        Err(AppError::Unavailable { reservation_id, .. }) => reservation_id,
        other => panic!("expected Unavailable, got {:?}", other),
    };

    assert!(matches!(
        lib.services.reservations.cancel(&Caller::member(3), reservation_id).await,
        Err(AppError::Authorization(_))
    ));

    let cancelled = lib
        .services
        .reservations
        .cancel(&Caller::member(2), reservation_id)
        .await
        .unwrap();
    assert_eq!(cancelled.status, ReservationStatus::Cancelled);
    assert!(lib
        .services
        .reservations
        .queue_for(&ADMIN, book_id)
        .await
        .unwrap()
        .is_empty());
    assert!(matches!(
        lib.services.reservations.cancel(&Caller::member(2), reservation_id).await,
        Err(AppError::Conflict(_))
    ));
}

#[tokio::test]
async fn admin_only_listings() {
    let lib = library();
    let book_id = lib.add_book("isbn-a", 2).await;
    lib.services
        .borrows
        .request_borrow(&Caller::member(1), book_id)
        .await
        .unwrap();
    lib.services
        .borrows
        .request_borrow(&Caller::member(2), book_id)
        .await
        .unwrap();

    assert!(matches!(
        lib.services.borrows.list_all(&Caller::member(1)).await,
        Err(AppError::Authorization(_))
    ));
    assert_eq!(lib.services.borrows.list_all(&ADMIN).await.unwrap().len(), 2);

    let history = lib.services.borrows.list_history(&Caller::member(2)).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].user_id, 2);

    assert!(matches!(
        lib.services.borrows.get(&Caller::member(1), history[0].id).await,
        Err(AppError::Authorization(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_never_overdraw_copies() {
    let lib = library();
    let book_id = lib.add_book("isbn-a", 3).await;

    let mut handles = Vec::new();
    for user_id in 1..=10 {
        let services = lib.services.clone();
        handles.push(tokio::spawn(async move {
            services
                .borrows
                .request_borrow(&Caller::member(user_id), book_id)
                .await
        }));
    }

    let mut borrowed = 0;
    let mut reserved = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => borrowed += 1,
            Err(AppError::Unavailable { .. }) => reserved += 1,
            Err(other) => panic!("unexpected error {:?}", other),
        }
    }

    assert_eq!(borrowed, 3);
    assert_eq!(reserved, 7);
    assert_eq!(lib.available(book_id).await, 0);
    assert_eq!(
        lib.services.reservations.queue_for(&ADMIN, book_id).await.unwrap().len(),
        7
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_returns_restore_every_copy_once() {
    let lib = library();
    let book_id = lib.add_book("isbn-a", 4).await;

    let mut borrow_ids = Vec::new();
    for user_id in 1..=4 {
        let borrow = lib
            .services
            .borrows
            .request_borrow(&Caller::member(user_id), book_id)
            .await
            .unwrap();
        borrow_ids.push(borrow.id);
    }

    let mut handles = Vec::new();
    for borrow_id in borrow_ids.iter().copied().chain(borrow_ids.iter().copied()) {
        let services = lib.services.clone();
        handles.push(tokio::spawn(async move {
            services.borrows.return_book(&ADMIN, borrow_id).await
        }));
    }

    let mut returned = 0;
    let mut already = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => returned += 1,
            Err(AppError::AlreadyReturned(_)) => already += 1,
            Err(other) => panic!("unexpected error {:?}", other),
        }
    }

    assert_eq!((returned, already), (4, 4));
    assert_eq!(lib.available(book_id).await, 4);
}

#[tokio::test]
async fn copies_stay_within_bounds_through_a_busy_day() {
    let lib = library();
    let book_id = lib.add_book("isbn-a", 2).await;
    let mut open = Vec::new();

    for round in 0..6 {
        for user_id in 1..=4 {
            match lib
                .services
                .borrows
                .request_borrow(&Caller::member(user_id), book_id)
                .await
            {
                Ok(borrow) => open.push(borrow.id),
                Err(AppError::Unavailable { .. }) | Err(AppError::DuplicateActiveLoan { .. }) => {}
                Err(other) => panic!("unexpected error {:?}", other),
            }
            let available = lib.available(book_id).await;
            assert!((0..=2).contains(&available), "round {}: {}", round, available);
        }
        if let Some(borrow_id) = open.pop() {
            lib.clock.advance(Duration::days(3));
            lib.services.borrows.return_book(&ADMIN, borrow_id).await.unwrap();
        }
    }

    let all = lib.services.borrows.list_all(&ADMIN).await.unwrap();
    for user_id in 1..=4 {
        let active = all
            .iter()
            .filter(|b| b.user_id == user_id && b.status.is_active())
            .count();
        assert!(active <= 1);
    }
    let on_loan = all.iter().filter(|b| b.status.is_active()).count() as i32;
    assert_eq!(lib.available(book_id).await, 2 - on_loan);
}

#[tokio::test]
async fn borrow_listings_flag_overdue_loans() {
    let lib = library();
    let book_id = lib.add_book("isbn-a", 2).await;
    let late = lib
        .services
        .borrows
        .request_borrow(&Caller::member(1), book_id)
        .await
        .unwrap();
    assert!(!late.overdue);

    lib.clock.set(late.due_date + Duration::hours(1));
    lib.services
        .borrows
        .request_borrow(&Caller::member(2), book_id)
        .await
        .unwrap();

    let all = lib.services.borrows.list_all(&ADMIN).await.unwrap();
    let flags: Vec<(i32, bool)> = all.iter().map(|b| (b.user_id, b.overdue)).collect();
    assert_eq!(flags, vec![(1, true), (2, false)]);
    assert!(all.iter().all(|b| b.status == BorrowStatus::Borrowed));

    assert!(lib.services.borrows.list_history(&Caller::member(1)).await.unwrap()[0].overdue);
    assert!(lib.services.borrows.get(&ADMIN, late.id).await.unwrap().overdue);

    lib.services.borrows.return_book(&ADMIN, late.id).await.unwrap();
    assert!(!lib.services.borrows.get(&ADMIN, late.id).await.unwrap().overdue);
}

#[tokio::test]
async fn reservation_visible_to_holder_and_admin_only() {
    let lib = library();
    let book_id = lib.add_book("isbn-a", 1).await;
    lib.services
        .borrows
        .request_borrow(&Caller::member(1), book_id)
        .await
        .unwrap();
    let reservation_id = match lib
        .services
        .borrows
        .request_borrow(&Caller::member(2), book_id)
        .await
    {
        Err(AppError::Unavailable { reservation_id, .. }) => reservation_id,
        other => panic!("expected Unavailable, got {:?}", other),
    };

    let mine = lib
        .services
        .reservations
        .get(&Caller::member(2), reservation_id)
        .await
        .unwrap();
    assert_eq!(mine.book_id, book_id);
    assert_eq!(mine.status, ReservationStatus::Pending);
    assert_eq!(
        lib.services.reservations.get(&ADMIN, reservation_id).await.unwrap(),
        mine
    );
    assert!(matches!(
        lib.services.reservations.get(&Caller::member(1), reservation_id).await,
        Err(AppError::Authorization(_))
    ));
    assert!(matches!(
        lib.services.reservations.get(&ADMIN, 9999).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn sub_cent_fine_rate_is_refused_at_startup() {
    let repository = Repository::in_memory(MemoryStore::new());
    let result = Services::new(
        repository,
        CirculationConfig {
            loan_period_days: 14,
            fine_rate_per_day: Decimal::new(4, 3),
        },
        test_clock(Utc::now()),
        Arc::new(LogNotifier),
    );
    assert!(matches!(result, Err(AppError::Validation(_))));
}

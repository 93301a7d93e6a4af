mod common;

use chrono::{Duration, NaiveDate, Utc};
use common::*;
use lapangan::{
    domain::{BookingStatus, CancellationType, PaymentStatus, RescheduleBookingRequest, TimeRange},
    domain::refund::RefundTier,
    error::AppError,
};

#[tokio::test]
async fn test_flat_price_scenario() -> anyhow::Result<()> {
    let app = setup().await?;
    let slot = TimeRange::new(t(18, 0), t(19, 0))?;

    let quote = app
        .ctx
        .venue_service
        .compute_price(app.venue.id, play_date(), &slot)
        .await?;
    assert_eq!(quote.total, 100_000);
    assert!(!quote.weekend);

    // Deterministic
    let again = app
        .ctx
        .venue_service
        .compute_price(app.venue.id, play_date(), &slot)
        .await?;
    assert_eq!(quote, again);
    Ok(())
}

#[tokio::test]
async fn test_overlapping_request_is_a_slot_conflict() -> anyhow::Result<()> {
    let app = setup().await?;
    let bookings = &app.ctx.booking_service;

    let first = bookings
        .create_booking_at(booking_request(&app.venue, t(10, 0), t(11, 0)), Some(&app.customer), two_days_before())
        .await?;
    let tx = app.ctx.payment_service.for_booking(first.id).await?;
    app.ctx.payment_service.confirm_payment(tx.id, Some(app.admin.id)).await?;
    assert_eq!(bookings.get(first.id).await?.status, BookingStatus::Confirmed);

    let err = bookings
        .create_booking_at(booking_request(&app.venue, t(10, 30), t(11, 30)), None, two_days_before())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SlotConflict(_)), "got {:?}", err);

    // Touching intervals do not overlap.
    bookings
        .create_booking_at(booking_request(&app.venue, t(11, 0), t(12, 0)), None, two_days_before())
        .await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_for_one_slot_have_one_winner() -> anyhow::Result<()> {
    let app = setup_shared(4).await?;
    let far = NaiveDate::from_ymd_opt(2099, 1, 10).unwrap();

    let mut handles = Vec::new();
    for (start, end) in [
        (t(18, 0), t(19, 0)),
        (t(18, 30), t(19, 30)),
        (t(17, 30), t(18, 30)),
        (t(18, 0), t(20, 0)),
    ] {
        let ctx = app.ctx.clone();
        let mut request = booking_request(&app.venue, start, end);
        request.booking_date = far;
        handles.push(tokio::spawn(async move {
            ctx.booking_service
                .create_booking_at(request, None, two_days_before())
                .await
        }));
    }

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await?);
    }

    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    for outcome in outcomes.iter().filter_map(|r| r.as_ref().err()) {
        assert!(
            matches!(outcome, AppError::SlotConflict(_) | AppError::PersistenceConflict(_)),
            "got {:?}",
            outcome
        );
    }

    let holding = app.ctx.booking_repo.list_occupying(app.venue.id, far).await?;
    assert_eq!(holding.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_available_slots_follow_bookings() -> anyhow::Result<()> {
    let app = setup().await?;
    let availability = &app.ctx.availability_service;

    let before = availability.compute_available_slots(app.venue.id, play_date()).await?;
    assert_eq!(before.free, vec![TimeRange::new(t(8, 0), t(23, 0))?]);

    let booking = app
        .ctx
        .booking_service
        .create_booking_at(booking_request(&app.venue, t(10, 0), t(11, 0)), None, two_days_before())
        .await?;

    let after = availability.compute_available_slots(app.venue.id, play_date()).await?;
    assert_eq!(
        after.free,
        vec![TimeRange::new(t(8, 0), t(10, 0))?, TimeRange::new(t(11, 0), t(23, 0))?]
    );
    assert_eq!(after.booked, vec![booking.slot()]);

    app.ctx
        .booking_service
        .cancel_booking_at(booking.id, None, CancellationType::Customer, two_days_before())
        .await?;
    let freed = availability.compute_available_slots(app.venue.id, play_date()).await?;
    assert_eq!(freed.free, before.free);
    Ok(())
}

#[tokio::test]
async fn test_only_upcoming_dates_are_cached() -> anyhow::Result<()> {
    let app = setup().await?;
    let availability = &app.ctx.availability_service;
    let cache = availability.cache();
    let far = NaiveDate::from_ymd_opt(2099, 1, 10).unwrap();

    availability.compute_available_slots(app.venue.id, play_date()).await?;
    assert!(cache.is_empty().await);

    availability.compute_available_slots(app.venue.id, far).await?;
    assert_eq!(cache.len().await, 1);

    let mut request = booking_request(&app.venue, t(9, 0), t(10, 0));
    request.booking_date = far;
    app.ctx.booking_service.create_booking(request, None).await?;
    assert!(cache.is_empty().await);

    let refreshed = availability.compute_available_slots(app.venue.id, far).await?;
    assert_eq!(refreshed.booked, vec![TimeRange::new(t(9, 0), t(10, 0))?]);
    Ok(())
}

#[tokio::test]
async fn test_refund_tiers_follow_notice() -> anyhow::Result<()> {
    let app = setup().await?;
    let bookings = &app.ctx.booking_service;
    let payments = &app.ctx.payment_service;

    let cases = [
        (t(8, 0), t(9, 0), two_days_before(), RefundTier::Full, 100_000),
        (t(18, 0), t(19, 0), at(play_date(), 4, 0), RefundTier::Partial, 50_000),
        (t(20, 0), t(21, 0), at(play_date(), 12, 0), RefundTier::None, 0),
    ];

    for (start, end, cancel_at, tier, refund) in cases {
        let booking = bookings
            .create_booking_at(booking_request(&app.venue, start, end), Some(&app.customer), two_days_before())
            .await?;
        let tx = payments.for_booking(booking.id).await?;
        payments.confirm_payment(tx.id, Some(app.admin.id)).await?;

        let outcome = bookings
            .cancel_booking_at(booking.id, Some("rain".to_string()), CancellationType::Customer, cancel_at)
            .await?;
        assert_eq!(outcome.refund_tier, Some(tier));
        assert_eq!(outcome.refund_amount, refund);
        assert_eq!(outcome.booking.status, BookingStatus::Cancelled);
        let expected_payment = if refund > 0 { PaymentStatus::Refunded } else { PaymentStatus::Paid };
        assert_eq!(outcome.booking.payment_status, expected_payment);
    }

    // A cancelled booking cannot be cancelled again.
    let again = bookings
        .list(&Default::default(), 10, 0)
        .await?
        .into_iter()
        .find(|b| b.status == BookingStatus::Cancelled)
        .expect("a cancelled booking");
    let err = bookings
        .cancel_booking_at(again.id, None, CancellationType::Admin, two_days_before())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));
    Ok(())
}

#[tokio::test]
async fn test_completion_sweep_is_idempotent() -> anyhow::Result<()> {
    let app = setup().await?;
    let bookings = &app.ctx.booking_service;

    let booking = bookings
        .create_booking_at(booking_request(&app.venue, t(18, 0), t(19, 0)), None, two_days_before())
        .await?;
    bookings.confirm_booking(booking.id).await?;

    let early = bookings.complete_finished_at(at(play_date(), 18, 30)).await?;
    assert_eq!(early.processed, 0);

    let report = bookings.complete_finished_at(at(play_date(), 20, 0)).await?;
    assert_eq!(report.processed, 1);
    assert_eq!(bookings.get(booking.id).await?.status, BookingStatus::Completed);

    let rerun = bookings.complete_finished_at(at(play_date(), 21, 0)).await?;
    assert_eq!(rerun.processed, 0);
    Ok(())
}

#[tokio::test]
async fn test_completion_sweep_counts_a_failure_and_finishes_the_rest() -> anyhow::Result<()> {
    let app = setup().await?;
    let bookings = &app.ctx.booking_service;

    let mut ids = Vec::new();
    for (start, end) in [(t(18, 0), t(19, 0)), (t(19, 0), t(20, 0)), (t(20, 0), t(21, 0))] {
        let booking = bookings
            .create_booking_at(booking_request(&app.venue, start, end), None, two_days_before())
            .await?;
        bookings.confirm_booking(booking.id).await?;
        ids.push(booking.id);
    }

    // Storage refuses any status change on the middle booking.
    sqlx::query(&format!(
        "CREATE TRIGGER refuse_status_change BEFORE UPDATE OF status ON bookings \
         WHEN OLD.id = '{}' BEGIN SELECT RAISE(ABORT, 'status change refused'); END",
        ids[1]
    ))
    .execute(&app.ctx.db_pool)
    .await?;

    let report = bookings.complete_finished_at(at(play_date(), 22, 0)).await?;
    assert_eq!(report.processed, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped, 0);

    assert_eq!(bookings.get(ids[0]).await?.status, BookingStatus::Completed);
    assert_eq!(bookings.get(ids[1]).await?.status, BookingStatus::Confirmed);
    assert_eq!(bookings.get(ids[2]).await?.status, BookingStatus::Completed);
    Ok(())
}

#[tokio::test]
async fn test_expiry_cancels_unpaid_bookings() -> anyhow::Result<()> {
    let app = setup().await?;
    let bookings = &app.ctx.booking_service;

    let far = NaiveDate::from_ymd_opt(2099, 1, 10).unwrap();
    let mut request = booking_request(&app.venue, t(9, 0), t(10, 0));
    request.booking_date = far;
    let booking = bookings.create_booking(request, None).await?;

    let none_yet = bookings.expire_unpaid_at(Utc::now()).await?;
    assert_eq!(none_yet.processed, 0);

    let report = bookings.expire_unpaid_at(Utc::now() + Duration::hours(2)).await?;
    assert_eq!(report.processed, 1);

    let expired = bookings.get(booking.id).await?;
    assert_eq!(expired.status, BookingStatus::Cancelled);
    assert_eq!(expired.payment_status, PaymentStatus::Failed);
    assert_eq!(expired.cancellation_type, Some(CancellationType::System));
    Ok(())
}

#[tokio::test]
async fn test_reminders_are_sent_once() -> anyhow::Result<()> {
    let app = setup().await?;
    let bookings = &app.ctx.booking_service;

    let booking = bookings
        .create_booking_at(booking_request(&app.venue, t(18, 0), t(19, 0)), None, two_days_before())
        .await?;
    bookings.confirm_booking(booking.id).await?;

    let first = bookings.send_reminders_for(play_date()).await?;
    assert_eq!(first.processed, 1);
    let second = bookings.send_reminders_for(play_date()).await?;
    assert_eq!(second.processed, 0);

    let reminders = app
        .outbox
        .subjects()
        .into_iter()
        .filter(|s| s.starts_with("Reminder"))
        .count();
    assert_eq!(reminders, 1);
    Ok(())
}

#[tokio::test]
async fn test_reschedule_moves_booking_and_checks_the_new_slot() -> anyhow::Result<()> {
    let app = setup().await?;
    let bookings = &app.ctx.booking_service;

    let blocker = bookings
        .create_booking_at(booking_request(&app.venue, t(12, 0), t(13, 0)), None, two_days_before())
        .await?;
    let booking = bookings
        .create_booking_at(booking_request(&app.venue, t(10, 0), t(11, 0)), None, two_days_before())
        .await?;

    let err = bookings
        .reschedule_booking_at(
            booking.id,
            RescheduleBookingRequest {
                booking_date: play_date(),
                start_time: t(12, 30),
                end_time: t(13, 30),
            },
            two_days_before(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SlotConflict(_)));

    let moved = bookings
        .reschedule_booking_at(
            booking.id,
            RescheduleBookingRequest {
                booking_date: play_date(),
                start_time: t(14, 0),
                end_time: t(16, 0),
            },
            two_days_before(),
        )
        .await?;
    assert_eq!(moved.slot(), TimeRange::new(t(14, 0), t(16, 0))?);
    assert_eq!(moved.price, 200_000);
    assert_ne!(moved.id, blocker.id);
    Ok(())
}

#[tokio::test]
async fn test_reschedule_reprices_the_open_transaction() -> anyhow::Result<()> {
    let app = setup().await?;
    let bookings = &app.ctx.booking_service;
    let payments = &app.ctx.payment_service;

    let booking = bookings
        .create_booking_at(booking_request(&app.venue, t(10, 0), t(11, 0)), Some(&app.customer), two_days_before())
        .await?;
    assert_eq!(payments.for_booking(booking.id).await?.amount, 100_000);

    let moved = bookings
        .reschedule_booking_at(
            booking.id,
            RescheduleBookingRequest {
                booking_date: play_date(),
                start_time: t(14, 0),
                end_time: t(16, 0),
            },
            two_days_before(),
        )
        .await?;
    assert_eq!(moved.price, 200_000);

    let tx = payments.for_booking(booking.id).await?;
    assert_eq!(tx.amount, moved.price);
    assert_eq!(tx.total_amount, tx.amount + tx.admin_fee);

    payments.confirm_payment(tx.id, Some(app.admin.id)).await?;
    let invoice = app
        .ctx
        .invoice_service
        .find_by_booking(booking.id)
        .await?
        .expect("invoice issued on confirmation");
    assert_eq!(invoice.total, payments.for_booking(booking.id).await?.amount);
    assert_eq!(app.ctx.points_service.balance(app.customer.id).await?, 200);

    // Full notice refunds what was actually paid and takes the earned points back.
    let outcome = bookings
        .cancel_booking_at(booking.id, None, CancellationType::Customer, two_days_before())
        .await?;
    assert_eq!(outcome.refund_tier, Some(RefundTier::Full));
    assert_eq!(outcome.refund_amount, 200_000);
    assert_eq!(outcome.points_reversed, 200);
    assert_eq!(app.ctx.points_service.balance(app.customer.id).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_paid_booking_keeps_its_amount_when_rescheduled() -> anyhow::Result<()> {
    let app = setup().await?;
    let bookings = &app.ctx.booking_service;
    let payments = &app.ctx.payment_service;

    let booking = bookings
        .create_booking_at(booking_request(&app.venue, t(10, 0), t(11, 0)), None, two_days_before())
        .await?;
    let tx = payments.for_booking(booking.id).await?;
    payments.confirm_payment(tx.id, Some(app.admin.id)).await?;

    let moved = bookings
        .reschedule_booking_at(
            booking.id,
            RescheduleBookingRequest {
                booking_date: play_date(),
                start_time: t(14, 0),
                end_time: t(16, 0),
            },
            two_days_before(),
        )
        .await?;
    assert_eq!(moved.price, 100_000);
    assert_eq!(payments.for_booking(booking.id).await?.amount, 100_000);
    Ok(())
}

#[tokio::test]
async fn test_creation_notifies_the_customer() -> anyhow::Result<()> {
    let app = setup().await?;
    let booking = app
        .ctx
        .booking_service
        .create_booking_at(booking_request(&app.venue, t(18, 0), t(19, 0)), None, two_days_before())
        .await?;

    assert_eq!(app.outbox.subjects(), vec![format!("Booking {} received", booking.code)]);
    let sent = app.outbox.sent.lock().unwrap();
    assert!(sent[0].body.contains("Rp 100.000"));
    Ok(())
}

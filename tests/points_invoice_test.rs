mod common;

use common::*;
use lapangan::{
    domain::{CancellationType, CreateVenueRequest, PointEntryType},
    error::AppError,
};

#[tokio::test]
async fn test_redeeming_more_than_the_balance_changes_nothing() -> anyhow::Result<()> {
    let app = setup().await?;
    let points = &app.ctx.points_service;
    let holder = app.customer.id;

    points.adjust(holder, 500, "welcome bonus").await?;
    assert_eq!(points.balance(holder).await?, 500);

    let booking = app
        .ctx
        .booking_service
        .create_booking_at(booking_request(&app.venue, t(18, 0), t(19, 0)), Some(&app.customer), two_days_before())
        .await?;

    match points.redeem(holder, 600, &booking).await {
        Err(AppError::InsufficientPoints { requested, available }) => {
            assert_eq!(requested, 600);
            assert_eq!(available, 500);
        }
        other => panic!("expected InsufficientPoints, got {:?}", other),
    }

    assert_eq!(points.balance(holder).await?, 500);
    assert_eq!(points.history(holder, 10, 0).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_ledger_balance_is_the_sum_of_entries() -> anyhow::Result<()> {
    let app = setup().await?;
    let points = &app.ctx.points_service;
    let holder = app.customer.id;

    points.adjust(holder, 300, "promo").await?;
    points.adjust(holder, -120, "correction").await?;
    points.adjust(holder, 45, "promo").await?;

    let history = points.history(holder, 10, 0).await?;
    let sum: i64 = history.iter().map(|e| e.points).sum();
    assert_eq!(sum, 225);
    assert_eq!(points.balance(holder).await?, 225);
    assert!(history.iter().all(|e| e.balance_after >= 0));

    let err = points.adjust(holder, -226, "too much").await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientPoints { .. }));
    let err = points.adjust(holder, 0, "nothing").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn test_guests_cannot_redeem_points() -> anyhow::Result<()> {
    let app = setup().await?;
    let mut request = booking_request(&app.venue, t(18, 0), t(19, 0));
    request.points_to_redeem = 100;

    let err = app
        .ctx
        .booking_service
        .create_booking_at(request, None, two_days_before())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn test_failed_redemption_does_not_hold_the_slot() -> anyhow::Result<()> {
    let app = setup().await?;
    let mut request = booking_request(&app.venue, t(18, 0), t(19, 0));
    request.points_to_redeem = 100;

    let err = app
        .ctx
        .booking_service
        .create_booking_at(request, Some(&app.customer), two_days_before())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientPoints { .. }));

    app.ctx
        .booking_service
        .create_booking_at(booking_request(&app.venue, t(18, 0), t(19, 0)), None, two_days_before())
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_confirming_twice_issues_one_invoice_with_points_discount() -> anyhow::Result<()> {
    let app = setup().await?;
    let holder = app.customer.id;
    app.ctx.points_service.adjust(holder, 2_000, "loyalty import").await?;

    let venue = app
        .ctx
        .venue_service
        .create(CreateVenueRequest {
            title: "Court B".to_string(),
            category: "futsal".to_string(),
            description: None,
            price: Some(150_000),
            weekday_price: None,
            weekend_price: None,
            peak_hours: None,
            open_time: None,
            close_time: None,
        })
        .await?;

    let mut request = booking_request(&venue, t(18, 0), t(19, 0));
    request.points_to_redeem = 2_000;
    let booking = app
        .ctx
        .booking_service
        .create_booking_at(request, Some(&app.customer), two_days_before())
        .await?;
    assert_eq!(app.ctx.points_service.balance(holder).await?, 0);

    let tx = app.ctx.payment_service.for_booking(booking.id).await?;
    assert_eq!(tx.amount, 149_980);

    app.ctx.payment_service.confirm_payment(tx.id, Some(app.admin.id)).await?;
    let again = app.ctx.payment_service.confirm_payment(tx.id, Some(app.admin.id)).await?;
    assert_eq!(again.confirmed_by, Some(app.admin.id));

    let invoices = app.ctx.invoice_service.list(10, 0).await?;
    assert_eq!(invoices.len(), 1);
    let invoice = &invoices[0];
    assert_eq!(invoice.booking_id, booking.id);
    assert_eq!(invoice.subtotal, 150_000);
    assert_eq!(invoice.discount, 20);
    assert_eq!(invoice.total, 149_980);

    // Manual regeneration returns the same invoice.
    let regenerated = app.ctx.invoice_service.generate_for_booking(booking.id).await?;
    assert_eq!(regenerated.id, invoice.id);
    assert_eq!(app.ctx.invoice_service.list(10, 0).await?.len(), 1);

    // 150,000 / 1,000 points earned exactly once.
    let history = app.ctx.points_service.history(holder, 10, 0).await?;
    let earned: Vec<_> = history
        .iter()
        .filter(|e| e.entry_type == PointEntryType::Earned)
        .collect();
    assert_eq!(earned.len(), 1);
    assert_eq!(earned[0].points, 150);
    assert_eq!(app.ctx.points_service.balance(holder).await?, 150);
    Ok(())
}

#[tokio::test]
async fn test_cancelling_unpaid_booking_returns_redeemed_points() -> anyhow::Result<()> {
    let app = setup().await?;
    let holder = app.customer.id;
    app.ctx.points_service.adjust(holder, 1_000, "promo").await?;

    let mut request = booking_request(&app.venue, t(18, 0), t(19, 0));
    request.points_to_redeem = 1_000;
    let booking = app
        .ctx
        .booking_service
        .create_booking_at(request, Some(&app.customer), two_days_before())
        .await?;
    assert_eq!(app.ctx.points_service.balance(holder).await?, 0);

    let outcome = app
        .ctx
        .booking_service
        .cancel_booking_at(booking.id, None, CancellationType::Customer, two_days_before())
        .await?;
    assert_eq!(outcome.points_returned, 1_000);
    assert_eq!(outcome.refund_amount, 0);
    assert_eq!(app.ctx.points_service.balance(holder).await?, 1_000);
    Ok(())
}

async fn court_b(app: &TestApp) -> anyhow::Result<lapangan::domain::Venue> {
    Ok(app
        .ctx
        .venue_service
        .create(CreateVenueRequest {
            title: "Court B".to_string(),
            category: "futsal".to_string(),
            description: None,
            price: Some(150_000),
            weekday_price: None,
            weekend_price: None,
            peak_hours: None,
            open_time: None,
            close_time: None,
        })
        .await?)
}

#[tokio::test]
async fn test_full_refund_reverses_earned_points() -> anyhow::Result<()> {
    let app = setup().await?;
    let holder = app.customer.id;
    let venue = court_b(&app).await?;

    let booking = app
        .ctx
        .booking_service
        .create_booking_at(booking_request(&venue, t(18, 0), t(19, 0)), Some(&app.customer), two_days_before())
        .await?;
    let tx = app.ctx.payment_service.for_booking(booking.id).await?;
    app.ctx.payment_service.confirm_payment(tx.id, Some(app.admin.id)).await?;
    assert_eq!(app.ctx.points_service.balance(holder).await?, 150);

    let outcome = app
        .ctx
        .booking_service
        .cancel_booking_at(booking.id, None, CancellationType::Customer, two_days_before())
        .await?;
    assert_eq!(outcome.refund_amount, 150_000);
    assert_eq!(outcome.points_reversed, 150);
    assert_eq!(app.ctx.points_service.balance(holder).await?, 0);

    let history = app.ctx.points_service.history(holder, 10, 0).await?;
    let reversal = history
        .iter()
        .find(|e| e.entry_type == PointEntryType::Adjusted)
        .expect("reversal entry");
    assert_eq!(reversal.points, -150);
    assert_eq!(reversal.booking_id, Some(booking.id));
    Ok(())
}

#[tokio::test]
async fn test_reversal_is_clamped_to_the_remaining_balance() -> anyhow::Result<()> {
    let app = setup().await?;
    let holder = app.customer.id;
    let venue = court_b(&app).await?;

    let booking = app
        .ctx
        .booking_service
        .create_booking_at(booking_request(&venue, t(18, 0), t(19, 0)), Some(&app.customer), two_days_before())
        .await?;
    let tx = app.ctx.payment_service.for_booking(booking.id).await?;
    app.ctx.payment_service.confirm_payment(tx.id, Some(app.admin.id)).await?;
    app.ctx.points_service.adjust(holder, -100, "spent elsewhere").await?;
    assert_eq!(app.ctx.points_service.balance(holder).await?, 50);

    let outcome = app
        .ctx
        .booking_service
        .cancel_booking_at(booking.id, None, CancellationType::Customer, two_days_before())
        .await?;
    assert_eq!(outcome.points_reversed, 50);
    assert_eq!(outcome.booking.status, lapangan::domain::BookingStatus::Cancelled);
    assert_eq!(app.ctx.points_service.balance(holder).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_partial_refund_keeps_earned_points() -> anyhow::Result<()> {
    let app = setup().await?;
    let holder = app.customer.id;
    let venue = court_b(&app).await?;

    let booking = app
        .ctx
        .booking_service
        .create_booking_at(booking_request(&venue, t(18, 0), t(19, 0)), Some(&app.customer), two_days_before())
        .await?;
    let tx = app.ctx.payment_service.for_booking(booking.id).await?;
    app.ctx.payment_service.confirm_payment(tx.id, Some(app.admin.id)).await?;

    let outcome = app
        .ctx
        .booking_service
        .cancel_booking_at(booking.id, None, CancellationType::Customer, at(play_date(), 4, 0))
        .await?;
    assert_eq!(outcome.refund_amount, 75_000);
    assert_eq!(outcome.points_reversed, 0);
    assert_eq!(app.ctx.points_service.balance(holder).await?, 150);
    Ok(())
}

#[tokio::test]
async fn test_rejected_payment_is_final() -> anyhow::Result<()> {
    let app = setup().await?;
    let payments = &app.ctx.payment_service;
    let booking = app
        .ctx
        .booking_service
        .create_booking_at(booking_request(&app.venue, t(18, 0), t(19, 0)), None, two_days_before())
        .await?;

    let waiting = payments.submit_proof(&booking, "/storage/first.jpg").await?;
    assert_eq!(waiting.proof_path.as_deref(), Some("/storage/first.jpg"));

    let rejected = payments.reject_payment(waiting.id, "blurry photo").await?;
    assert_eq!(rejected.rejection_reason.as_deref(), Some("blurry photo"));
    assert!(app
        .outbox
        .subjects()
        .iter()
        .any(|s| s.starts_with("Payment for")));

    let booking = app.ctx.booking_service.get(booking.id).await?;
    let err = payments
        .submit_proof(&booking, "/storage/second.jpg")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));

    let err = payments.confirm_payment(rejected.id, Some(app.admin.id)).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));
    Ok(())
}

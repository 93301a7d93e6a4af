use chrono::Duration;
use clap::Parser;
use fake::{
    faker::{internet::en::SafeEmail, name::en::Name},
    Fake,
};
use lapangan::{
    config::Settings,
    domain::{
        CreateBookingRequest, CreatePaymentMethodRequest, CreateUserRequest, CreateVenueRequest, FeeType,
        PeakHours, TimeOfDay, TimeRange, User, UserRole,
    },
    service::ServiceContext,
};
use sqlx::sqlite::SqlitePoolOptions;

/// Populate a database with demo venues, payment methods, users and bookings.
#[derive(Debug, Parser)]
#[command(name = "seed")]
struct Args {
    /// SQLite connection string
    #[arg(long, default_value = "sqlite://lapangan.db?mode=rwc")]
    database_url: String,

    /// Number of customer accounts to create
    #[arg(long, default_value_t = 5)]
    customers: usize,

    /// Number of bookings to place for tomorrow
    #[arg(long, default_value_t = 12)]
    bookings: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    println!("🌱 Starting database seeding...");

    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&args.database_url)
        .await?;

    println!("📋 Running migrations...");
    sqlx::migrate!("./migrations").run(&db_pool).await?;

    let mut settings = Settings::new().unwrap_or_default();
    settings.notifications.channels = vec!["log".to_string()];
    let ctx = ServiceContext::new(db_pool, &settings).await;

    println!("💳 Creating payment methods...");
    let methods = [
        ("bca", "BCA Transfer", FeeType::Fixed, 0.0, "Transfer to BCA 123-456-7890 a/n Lapangan"),
        ("qris", "QRIS", FeeType::Percentage, 0.7, "Scan the QR code at the front desk"),
        ("ewallet", "E-Wallet", FeeType::Fixed, 1500.0, "Pay to 0812-0000-0000"),
    ];
    for (order, (code, name, fee_type, fee_value, instructions)) in methods.into_iter().enumerate() {
        ctx.payment_service
            .create_method(CreatePaymentMethodRequest {
                code: code.to_string(),
                name: name.to_string(),
                fee_type,
                fee_value,
                instructions: Some(instructions.to_string()),
                display_order: Some(order as i32),
            })
            .await?;
    }
    println!("  ✅ Created {} payment methods", methods.len());

    println!("🏟️  Creating venues...");
    let evening = PeakHours {
        window: TimeRange::new(hm(17, 0)?, hm(22, 0)?)?,
        multiplier: 1.5,
    };
    let venue_requests = vec![
        CreateVenueRequest {
            title: "Futsal Court A".to_string(),
            category: "futsal".to_string(),
            description: Some("Indoor vinyl court".to_string()),
            price: Some(150_000),
            weekday_price: None,
            weekend_price: None,
            peak_hours: Some(evening),
            open_time: Some(hm(8, 0)?),
            close_time: Some(hm(23, 0)?),
        },
        CreateVenueRequest {
            title: "Badminton Hall 1".to_string(),
            category: "badminton".to_string(),
            description: None,
            price: None,
            weekday_price: Some(60_000),
            weekend_price: Some(80_000),
            peak_hours: None,
            open_time: None,
            close_time: None,
        },
        CreateVenueRequest {
            title: "Mini Soccer Field".to_string(),
            category: "mini_soccer".to_string(),
            description: Some("Synthetic grass, floodlit".to_string()),
            price: None,
            weekday_price: Some(400_000),
            weekend_price: Some(550_000),
            peak_hours: Some(evening),
            open_time: Some(hm(6, 0)?),
            close_time: Some(TimeOfDay::END_OF_DAY),
        },
    ];
    let mut venues = Vec::new();
    for request in venue_requests {
        venues.push(ctx.venue_service.create(request).await?);
    }
    println!("  ✅ Created {} venues", venues.len());

    println!("👥 Creating users...");
    let admin = ctx
        .user_service
        .create(CreateUserRequest {
            name: "Admin".to_string(),
            email: "admin@lapangan.local".to_string(),
            phone: Some("081200000000".to_string()),
            password: "admin12345".to_string(),
            role: UserRole::Admin,
        })
        .await?;

    let mut customers: Vec<User> = Vec::new();
    for i in 0..args.customers {
        let name: String = Name().fake();
        let email: String = SafeEmail().fake();
        let customer = ctx
            .user_service
            .register(CreateUserRequest {
                name,
                email: format!("{}.{}", i, email),
                phone: Some(format!("0812{:08}", (10_000_000..99_999_999).fake::<u32>())),
                password: "password123".to_string(),
                role: UserRole::Customer,
            })
            .await?;
        customers.push(customer);
    }
    println!("  ✅ Created admin and {} customers", customers.len());

    println!("📅 Creating bookings...");
    let tomorrow = settings.booking.local_now().date() + Duration::days(1);
    let mut created = 0;
    let mut confirmed = 0;
    for i in 0..args.bookings {
        let venue = &venues[i % venues.len()];
        let hour = 8 + (i / venues.len()) as u16;
        if hour + 1 > 23 {
            break;
        }
        let customer = customers.get(i % customers.len().max(1));
        let request = CreateBookingRequest {
            venue_id: venue.id,
            booking_date: tomorrow,
            start_time: hm(hour, 0)?,
            end_time: hm(hour + 1, 0)?,
            customer_name: customer.map(|c| c.name.clone()).unwrap_or_else(|| Name().fake()),
            customer_phone: customer
                .and_then(|c| c.phone.clone())
                .unwrap_or_else(|| "081299999999".to_string()),
            customer_email: None,
            payment_method: if i % 2 == 0 { "bca" } else { "qris" }.to_string(),
            points_to_redeem: 0,
            notes: None,
        };

        let booking = match ctx.booking_service.create_booking(request, customer).await {
            Ok(booking) => booking,
            Err(e) => {
                println!("  ⚠️  Skipped booking at {}:00: {}", hour, e);
                continue;
            }
        };
        created += 1;

        if i % 3 != 2 {
            let transaction = ctx.payment_service.for_booking(booking.id).await?;
            ctx.payment_service
                .confirm_payment(transaction.id, Some(admin.id))
                .await?;
            confirmed += 1;
        }
    }
    println!("  ✅ Created {} bookings for {} ({} paid)", created, tomorrow, confirmed);

    println!("\n✨ Database seeding complete!");
    println!("\n📝 Test credentials:");
    println!("  Admin: admin@lapangan.local / admin12345");
    println!("  Customers: password123");

    Ok(())
}

fn hm(hour: u16, minute: u16) -> anyhow::Result<TimeOfDay> {
    TimeOfDay::new(hour, minute).ok_or_else(|| anyhow::anyhow!("invalid time {}:{}", hour, minute))
}

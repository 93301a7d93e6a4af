pub mod availability;
pub mod booking;
pub mod invoice;
pub mod payment;
pub mod points;
pub mod pricing;
pub mod refund;
pub mod schedule;
pub mod user;
pub mod venue;

pub use booking::*;
pub use invoice::*;
pub use payment::*;
pub use points::*;
pub use refund::RefundPolicy;
pub use schedule::*;
pub use user::*;
pub use venue::*;

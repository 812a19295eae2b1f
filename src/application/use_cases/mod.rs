pub mod callback;
pub mod invoice;
pub mod payments;
pub mod renewal;
pub mod subscriptions;

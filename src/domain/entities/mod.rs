pub mod money;
pub mod payment;
pub mod receipt;
pub mod subscription;

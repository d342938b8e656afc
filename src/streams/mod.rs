pub mod bus;
pub mod worker;

pub use bus::{StreamBus, StreamMessage};
pub use worker::GuardianWorker;

pub mod alert_queue;
pub mod sport_baseline;

pub use alert_queue::AlertQueue;
pub use sport_baseline::SportBaseline;

pub mod alert;
pub mod classifier;

pub use alert::build_favorite_medal_alert;

pub mod sqlite;

pub use sqlite::AnalyticsStore;

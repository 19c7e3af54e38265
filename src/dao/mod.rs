/// Match and ball-event storage, with change notifications.
pub mod ball_store;
/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;

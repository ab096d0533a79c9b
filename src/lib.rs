pub mod server;

pub mod db;
pub mod checkins;
pub mod alerting;

pub mod notifications;
pub mod version;

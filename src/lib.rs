pub mod app;
pub mod callerid;
pub mod callrecord;
pub mod config;
pub mod contacts;
pub mod handler;
pub mod phone;
pub mod store;
pub mod token;
pub mod twiml;
pub mod version;

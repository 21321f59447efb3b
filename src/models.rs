pub mod auth;
pub mod credit;
pub mod directory;
pub mod finance;
pub mod notification;

//! Family routine server: schedules, their expansion into dated task logs,
//! and the completion ledger behind a JSON API.

pub mod engine;
pub mod server;
pub mod storage;

#![forbid(unsafe_code)]

pub mod observe;
pub mod repository;
pub mod sqlite;

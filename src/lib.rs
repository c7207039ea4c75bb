pub mod auth;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod optimistic;
pub mod response;
pub mod routes;
pub mod service;

#[cfg(test)]
mod test_support;

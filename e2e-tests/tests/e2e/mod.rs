//! Shared harness: a mock Gmail REST server and fixtures for driving
//! `phish-rs` over real HTTP

#![allow(dead_code)]

pub mod gmail_server;
pub mod helpers;

#![allow(dead_code)]

pub mod identity;
pub mod mock_ws;

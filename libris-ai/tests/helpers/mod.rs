//! Test helpers shared by the integration tests

#![allow(dead_code)]

pub mod db_utils;
pub mod mock_providers;

//! Full-screen views, one per route.

pub mod home;
pub mod login;

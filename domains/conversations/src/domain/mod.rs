//! Domain logic for the Conversations domain

pub mod entities;
pub mod formatter;
pub mod history;

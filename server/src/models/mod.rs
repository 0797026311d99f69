pub mod availability;
pub mod department;
pub mod event;
pub mod message;

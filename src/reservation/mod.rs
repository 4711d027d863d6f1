//! Reservation lifecycle: provisional slots, release timers and approval

pub mod manager;

pub use manager::ReservationManager;

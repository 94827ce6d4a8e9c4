pub mod bookings;
pub mod health;
pub mod policies;
pub mod slots;
pub mod sweeps;

pub mod cancellation;
pub mod conflict;
pub mod events;
pub mod lifecycle;
pub mod local_time;
pub mod no_show;
pub mod slots;
pub mod time_window;

#[cfg(test)]
pub(crate) mod fixtures;

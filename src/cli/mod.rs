pub mod cpi;
pub mod schedule;
pub mod setup;
pub mod status;
pub mod ui;

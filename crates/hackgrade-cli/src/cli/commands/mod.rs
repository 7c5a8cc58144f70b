pub mod audit;
pub mod check_questions;
mod dispatch;
pub mod grade;
mod setup;

pub use dispatch::dispatch;

pub mod errors;
pub mod factory;
pub mod session;

pub use factory::{AppFactory, AppPaths};
pub use session::{BatchReport, Session, Upload};

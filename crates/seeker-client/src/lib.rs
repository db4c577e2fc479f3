pub mod browser_session;

pub use browser_session::{ChromeSession, ChromeSessionFactory, SessionOptions};

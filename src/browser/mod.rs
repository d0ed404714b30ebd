pub mod session;
pub mod webdriver;

// Re-export common types
pub use session::{CardFields, ProductListSession, SessionProvider};
pub use webdriver::WebDriverProvider;

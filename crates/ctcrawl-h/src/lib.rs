pub mod cdp;
pub mod session;

//! Headless browser fallback
//!
//! Used only when a page is blocked and no proxy got through. The browser is
//! launched once per run and shared; page tabs are pooled so render
//! concurrency stays bounded independently of fetch concurrency.

mod pool;
mod renderer;

pub use pool::{PageLease, PagePool};
pub use renderer::{ChromiumRenderer, PageRenderer};

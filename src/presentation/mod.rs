// Presentation layer - HTTP scrape surface
pub mod app_state;
pub mod handlers;

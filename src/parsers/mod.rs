//! Content extraction from rendered HTML.

pub mod html;
pub mod text;

#[cfg(test)]
mod tests;

pub use html::extract;

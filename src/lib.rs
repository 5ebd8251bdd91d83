//! Bookshelf application library
//!
//! Hosts the book resource module served by the `bookshelf` binary.

pub mod modules;

pub use modules::books;

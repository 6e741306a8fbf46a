//! Domain entities and pure logic. No I/O lives here.

pub mod entities;
pub mod limits;
pub mod tree;
pub mod types;

pub mod sqlite;
pub mod xml;

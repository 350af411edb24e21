//! Job CRUD on the record store (read and write split by concern).

mod read;
mod write;

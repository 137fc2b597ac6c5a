#![forbid(unsafe_code)]

pub mod autosave;
pub mod model;
pub mod row;
pub mod storage;
pub mod store;

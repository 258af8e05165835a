// src/lib.rs
pub mod data {
    pub mod run_file;
    pub mod report;
}

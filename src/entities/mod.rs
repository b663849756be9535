pub mod commerce;
pub mod product; // Read-only catalog table referenced by cart lines
pub mod user;

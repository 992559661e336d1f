pub mod facts;
pub mod report;

pub mod catalog;
pub mod claim;
pub mod inspection;
pub mod scope;

pub mod document;
pub mod entries;
pub mod requirements;

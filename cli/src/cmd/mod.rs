pub mod cat;
pub mod count;
pub mod headers;
pub mod stats;

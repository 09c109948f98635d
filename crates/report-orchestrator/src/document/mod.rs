//! Request documents carried on the broker queue

mod parser;

pub use parser::parse_request;

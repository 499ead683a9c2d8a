//! Graph input module

pub mod json;

pub use json::{load_graph, load_graph_file, parse_graph};

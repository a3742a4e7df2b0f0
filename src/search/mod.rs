pub mod state;
pub mod hits;
pub mod cache;
pub mod sequential;
pub mod searcher;
pub mod property;
pub mod window;
pub mod sample;
pub mod sort;
pub mod group;
pub mod filter;
pub mod docs;
pub mod doc_groups;

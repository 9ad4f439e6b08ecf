pub mod chunking_strategy;
pub mod index_builder;
pub mod retriever;
pub mod retry;
pub mod shared;

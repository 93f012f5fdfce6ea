pub mod consciousness;
pub mod decay;
pub mod facts;
pub mod ingestion;
pub mod retrieval;
pub mod root;
pub mod stats;

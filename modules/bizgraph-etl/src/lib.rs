pub mod businesses;
pub mod containment;
pub mod enrichment;
pub mod entities;
pub mod pipeline;
pub mod report;
pub mod topology;
pub mod writer;

pub use pipeline::{Component, PopulateOptions, Populator, Selection, Sources};
pub use report::{BatchReport, ComponentReport, Failure, PopulationReport};
pub use writer::{GraphWriter, WriteError};

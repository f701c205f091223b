// Library exports for nailscan
pub mod accession;
pub mod annotation;
pub mod benchmark;
pub mod best_hit;
pub mod clan;
pub mod error;
pub mod hierarchy;
pub mod hit;
pub mod io;
pub mod models;
pub mod overlap;
pub mod pipeline;
pub mod policy;
pub mod thresholds;
pub mod tsv;
pub mod union_find;

pub use error::{NailscanError, Result};
pub use hit::{Database, HitRecord};
pub use pipeline::{Pipeline, Tables};
pub use policy::{DatabasePolicy, Grouping, OverlapPolicy, Scope, Strategy};

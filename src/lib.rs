mod association;
mod config;
mod error;
mod files;
mod filter;
mod generalize;
mod pipeline;
mod profiles;
mod similarity;
mod symbols;
mod tabular;
mod work;

pub use association::{Associations, Orientation};
pub use config::{Config, GeneralizeParams, ProfileParams, SimilarityParams, Stage};
pub use error::{Error, Result};
pub use generalize::Generalize;
pub use pipeline::Pipeline;
pub use profiles::{Profile, ProfileIndex, ProfileTables};
pub use similarity::{Measure, MeasureSet, Similarity};
pub use symbols::{SymbolId, SymbolTable};
pub use work::distribute;

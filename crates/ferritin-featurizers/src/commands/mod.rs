pub mod confidence;
pub mod coverage;
pub mod featurize;

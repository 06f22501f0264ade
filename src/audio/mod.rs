pub mod analysis;
pub mod decode;
pub mod graph;
pub mod media;
pub mod output;
pub mod sampler;

// Library exports for dotsweep
pub mod coord_index;
pub mod delta;
pub mod filter_stream;
pub mod natural_sort;
pub mod plane_sweep;
pub mod query_index;
pub mod stats;

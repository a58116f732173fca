pub mod affinity;
pub mod composite;
pub mod input;
pub mod pipeline;
pub mod solver;
pub mod summed_area_table;
pub mod trimap;

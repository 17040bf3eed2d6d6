pub mod insert_throughput;
pub mod mixed_workload;
pub mod nop;
pub mod point_select;

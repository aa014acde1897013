pub mod dual_num_traits;
pub mod dual_ops;
pub mod var_num_traits;
pub mod var_ops;

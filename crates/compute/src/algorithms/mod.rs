//! Numerical kernels. Everything here is pure: no logging, no I/O, and no
//! knowledge of datasets or columns.

pub mod descriptive;
pub mod isolation_forest;
pub mod linalg;
pub mod normality;
pub mod probability;
pub mod regression_tree;

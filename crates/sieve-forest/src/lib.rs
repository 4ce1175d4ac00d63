//! # sieve-forest
//!
//! Regression models for Sieve: a CART regression tree, the random forest
//! ensemble used as the search surrogate, and a ridge linear model. All of
//! them implement [`sieve_types::Model`], so any of them can also be the
//! target model a search optimizes over.

mod forest;
mod linear;
mod tree;

pub use forest::{MaxFeatures, RandomForestRegressor};
pub use linear::LinearRegression;
pub use tree::{DecisionTreeRegressor, TreeNode};

mod builder;

pub use builder::{DmlQueryBuilder, SqlBuilder};

//! `SeaORM` entity definitions.

pub mod journals;

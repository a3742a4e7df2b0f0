pub mod contexts;
pub mod kwic;
pub mod concordances;

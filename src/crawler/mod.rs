pub mod scholar;

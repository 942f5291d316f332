// Serial sensor exporter - layered as domain / application / infrastructure / presentation
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

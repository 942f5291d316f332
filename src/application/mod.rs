// Application layer - Sampling, publishing and the poll loop
pub mod display;
pub mod publisher;
pub mod sampler;
pub mod scheduler;
pub mod sensor_adapter;

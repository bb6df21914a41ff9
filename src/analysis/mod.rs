pub mod clustering;
pub mod metrics;
pub mod projection;
pub mod survival;

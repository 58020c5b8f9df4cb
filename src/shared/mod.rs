pub mod ids;
pub mod logging;

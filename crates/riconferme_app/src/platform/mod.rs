pub mod last_run;
pub mod logging;
pub mod panic;
pub mod settings;

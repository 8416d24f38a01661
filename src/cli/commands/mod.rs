mod init;
mod run;

pub use init::execute_init;
pub use run::{execute_run, run_proxy};

mod error;
pub use error::{ExecError, ExecResult};

mod spec;
pub use spec::{CommandSpec, EnvPolicy, ProcessImage};

mod executor;
pub use executor::Executor;

mod util;

pub mod proc;
pub use proc::ProcRunner;

mod task;
pub use task::TaskKind;

//! CLI command handlers. Each command is in its own file.

mod cleanup;
mod delete;
mod host;
mod pause;
mod results;
mod resume;
mod status;
mod stop;
mod submit;

pub use cleanup::run_cleanup;
pub use delete::run_delete;
pub use pause::run_pause;
pub use results::run_results;
pub use resume::run_resume;
pub use status::run_status;
pub use stop::run_stop;
pub use submit::{run_submit, SubmitArgs};

#[cfg(test)]
pub(crate) use submit::{parse_set, read_pages};

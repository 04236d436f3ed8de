mod load;
mod types;

pub use load::{get_taskfan_data_dir, load_default};
pub use types::{ExecConfig, LoggingConfig};

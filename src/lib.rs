pub mod answer;
pub mod audio;
pub mod config;
pub mod history;
pub mod logging;
pub mod session;
pub mod stt;
pub mod telemetry;

pub use history::ConversationHistory;
pub use logging::{
    crash_log_path, init_logging, install_panic_hook, log_debug, log_debug_content,
    log_file_path, log_panic,
};
pub use session::{Session, SessionEvent, SessionStatus};

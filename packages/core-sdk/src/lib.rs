pub mod chat;
pub mod cleanup;
pub mod config;
pub mod llm;
pub mod models;
pub mod normalize;
pub mod providers;
pub mod server;
pub mod telemetry;

/**
 * \brief SDK prelude collecting the commonly used modules.
 */
pub mod prelude {
    pub use crate::chat;
    pub use crate::cleanup;
    pub use crate::config;
    pub use crate::llm;
    pub use crate::models;
    pub use crate::normalize;
    pub use crate::providers;
    pub use crate::server;
    pub use crate::telemetry;
}

/*
[INPUT]:  Public API exports for the marquee CLI crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod commands;
pub mod logging;
pub mod navigator;
pub mod settings;

// Re-export main types for convenience
pub use navigator::TerminalNavigator;
pub use settings::Settings;

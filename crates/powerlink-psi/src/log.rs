// crates/powerlink-psi/src/log.rs
use alloc::format;
use alloc::string::String;

/// Trait for structs that provide metadata for logging
pub trait LogMetadata {
    fn meta(&self) -> String;
}

/// Identifies the channel instance a log line belongs to.
pub struct LogContext {
    pub system: &'static str,
    pub component: &'static str,
    pub id: u32,
}

impl LogContext {
    pub const fn new(component: &'static str, id: u32) -> Self {
        Self {
            system: "psi",
            component,
            id,
        }
    }
}

impl LogMetadata for LogContext {
    fn meta(&self) -> String {
        format!(
            "system={}, component={}, id={}",
            self.system, self.component, self.id
        )
    }
}

// =============================================
// Logging Macros (namespaced under crate::log)
// =============================================

// ===== psi_info! =====
macro_rules! psi_info {
    ($ctx:expr, $fmt:literal $(, $($arg:tt)+)?) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        ::log::info!(concat!("[{}] ", $fmt), meta $(, $($arg)+)?);
    }};
}

// ===== psi_warn! =====
macro_rules! psi_warn {
    ($ctx:expr, $fmt:literal $(, $($arg:tt)+)?) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        ::log::warn!(concat!("[{}] ", $fmt), meta $(, $($arg)+)?);
    }};
}

// ===== psi_debug! =====
macro_rules! psi_debug {
    ($ctx:expr, $fmt:literal $(, $($arg:tt)+)?) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        ::log::debug!(concat!("[{}] ", $fmt), meta $(, $($arg)+)?);
    }};
}

// ===== psi_trace! =====
macro_rules! psi_trace {
    ($ctx:expr, $fmt:literal $(, $($arg:tt)+)?) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        ::log::trace!(concat!("[{}] ", $fmt), meta $(, $($arg)+)?);
    }};
}

// Re-export macros for use in other files
pub(crate) use psi_debug;
pub(crate) use psi_info;
pub(crate) use psi_trace;
pub(crate) use psi_warn;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_context_meta() {
        let ctx = LogContext::new("logbook", 3);
        assert_eq!(ctx.meta(), "system=psi, component=logbook, id=3");
    }
}

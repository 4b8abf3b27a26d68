//! ---
//! fsm_section: "03-logging"
//! fsm_subsection: "module"
//! fsm_type: "source"
//! fsm_scope: "code"
//! fsm_description: "Session-aware structured logging helpers."
//! fsm_version: "v0.0.0-prealpha"
//! fsm_owner: "tbd"
//! ---

/// Shared expansion behind the level-specific macros. Not part of the public API.
#[doc(hidden)]
#[macro_export]
macro_rules! __fsm_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx: &$crate::LogContext<'_> = $ctx;
        $crate::tracing::event!(
            $level,
            user = ctx.user.unwrap_or(""),
            route = ctx.route.unwrap_or(""),
            resource = ctx.resource.unwrap_or(""),
            phase = ctx.phase.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with session context.
#[macro_export]
macro_rules! fsm_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__fsm_event!($crate::tracing::Level::INFO, &$ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__fsm_event!($crate::tracing::Level::INFO, &$crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with session context.
#[macro_export]
macro_rules! fsm_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__fsm_event!($crate::tracing::Level::DEBUG, &$ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__fsm_event!($crate::tracing::Level::DEBUG, &$crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with session context.
#[macro_export]
macro_rules! fsm_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__fsm_event!($crate::tracing::Level::WARN, &$ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__fsm_event!($crate::tracing::Level::WARN, &$crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with session context.
#[macro_export]
macro_rules! fsm_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__fsm_event!($crate::tracing::Level::ERROR, &$ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__fsm_event!($crate::tracing::Level::ERROR, &$crate::LogContext::default(), $($arg)+)
    };
}

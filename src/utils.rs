use std::env::var;

/// Get the value of ENV var, if any
///
/// Only when:
/// - It is set
/// - It is not empty
pub fn env_var(var_name: &'static str) -> Option<String> {
    var(var_name).ok().filter(|value| !value.is_empty())
}

/// Get the value of ENV var, or a default
///
/// Same rules as [`env_var`]
pub fn env_var_or_else(var_name: &'static str, or_else: impl FnOnce() -> String) -> String {
    env_var(var_name).unwrap_or_else(or_else)
}

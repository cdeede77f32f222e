use std::env;

use tracing::warn;

/// Settings for evaluation and differentiation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// The largest derivative order that will be computed.
    /// A derivative of order `k` is stored in `2^k - 1` blocks.
    pub max_order: usize,
    /// Leave blocks zero instead of failing when a variable has no formula
    /// for a derivative of the requested order.
    pub unimplemented_as_zero: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_order: 10,
            unimplemented_as_zero: false,
        }
    }
}

impl Settings {
    /// Read the settings from `COMPUTED_VARIABLE_MAX_ORDER` and
    /// `COMPUTED_VARIABLE_UNIMPLEMENTED_AS_ZERO`, using the defaults for unset
    /// or malformed variables.
    pub fn from_env() -> Settings {
        Settings::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Settings {
        let mut settings = Settings::default();

        if let Some(v) = lookup("COMPUTED_VARIABLE_MAX_ORDER") {
            match v.trim().parse::<usize>() {
                Ok(o) if o > 0 && o < usize::BITS as usize => settings.max_order = o,
                _ => warn!(
                    "Ignoring COMPUTED_VARIABLE_MAX_ORDER={}: expected a positive order",
                    v
                ),
            }
        }

        if let Some(v) = lookup("COMPUTED_VARIABLE_UNIMPLEMENTED_AS_ZERO") {
            match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => settings.unimplemented_as_zero = true,
                "0" | "false" | "no" => settings.unimplemented_as_zero = false,
                _ => warn!(
                    "Ignoring COMPUTED_VARIABLE_UNIMPLEMENTED_AS_ZERO={}: expected a boolean",
                    v
                ),
            }
        }

        settings
    }
}

//! Application configuration.
//!
//! Settings are passed in explicitly. koru never reads the process
//! environment on its own; if you want `APP_ENV` to drive them, read it in
//! `main` and hand the value to [`Settings::for_environment`].

/// Options recognised by [`Application`](crate::Application).
///
/// | Field | Default |
/// |---|---|
/// | `environment` | `"development"` |
/// | `output_errors` | `true` unless the environment is `"test"` |
/// | `powered_by` | `true` |
/// | `json_spaces` | `2` |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub environment: String,
    /// Whether unhandled errors are logged by the default error handler.
    pub output_errors: bool,
    /// Whether responses carry `x-powered-by: koru`.
    pub powered_by: bool,
    /// Indent width for JSON bodies. `0` emits compact JSON.
    pub json_spaces: usize,
}

impl Settings {
    /// Defaults for the named environment.
    pub fn for_environment(environment: impl Into<String>) -> Self {
        let environment = environment.into();
        Self {
            output_errors: environment != "test",
            environment,
            powered_by: true,
            json_spaces: 2,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::for_environment("development")
    }
}

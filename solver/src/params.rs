//! Global parameters initialized from environment variables, for internal
//! knobs that do not warrant a place in the public API.

use std::str::FromStr;

/// A parameter holding the name of an environment variable and a default
/// value. It is read at most once, on first access; later changes to the
/// environment are ignored.
pub struct EnvParam<T> {
    value: once_cell::sync::OnceCell<T>,
    env: &'static str,
    default: &'static str,
}

impl<T> EnvParam<T> {
    pub const fn new(env: &'static str, default: &'static str) -> EnvParam<T> {
        EnvParam {
            value: once_cell::sync::OnceCell::new(),
            env,
            default,
        }
    }
}

impl<T: FromStr + Clone> EnvParam<T> {
    pub fn get(&self) -> T {
        self.value
            .get_or_init(|| {
                let parsed = std::env::var(self.env).ok().and_then(|raw| match T::from_str(&raw) {
                    Ok(v) => Some(v),
                    Err(_) => {
                        eprintln!("[params] ERROR {}: could not parse the value \"{raw}\".", self.env);
                        None
                    }
                });
                parsed.unwrap_or_else(|| {
                    T::from_str(self.default)
                        .unwrap_or_else(|_| panic!("{}: unparseable default \"{}\"", self.env, self.default))
                })
            })
            .clone()
    }
}

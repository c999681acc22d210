use toml::Value;
use tracing::debug;

use super::{PropertyName, PropertySource};

/// Maps prefixed environment variables onto property names.
///
/// With prefix `MYAPP` and separator `__`, `MYAPP__SERVER__PORT=8080` becomes
/// `server.port = "8080"` and `MYAPP__HOSTS__0=a` becomes `hosts[0] = "a"`.
/// Values stay strings; conversion happens at bind time.
#[derive(Debug, Clone)]
pub struct EnvSource {
    prefix: String,
    separator: String,
}

impl EnvSource {
    pub fn new(prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        let separator = separator.into();
        assert!(!separator.is_empty(), "separator must not be empty");
        Self {
            prefix: prefix.into(),
            separator,
        }
    }

    /// Reads the current process environment.
    pub fn load(&self) -> PropertySource {
        self.read_vars(std::env::vars())
    }

    /// Builds the source from an explicit set of variables.
    pub fn read_vars<I, K, V>(&self, vars: I) -> PropertySource
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let prefix_with_sep = format!("{}{}", self.prefix, self.separator);
        let mut source = PropertySource::new(format!("env:{}", self.prefix)).into_system();

        for (key, value) in vars {
            let key = key.as_ref();
            let Some(path_str) = key.strip_prefix(&prefix_with_sep) else {
                continue;
            };
            match self.property_name(path_str) {
                Some(name) => source.insert(name, Value::String(value.into())),
                None => debug!(variable = key, "skipping environment variable with an empty segment"),
            }
        }

        source
    }

    fn property_name(&self, path: &str) -> Option<PropertyName> {
        if path.is_empty() {
            return None;
        }
        let mut name = PropertyName::root();
        for segment in path.split(&self.separator) {
            if segment.is_empty() {
                return None;
            }
            name = match segment.parse::<usize>() {
                Ok(index) => name.index(index),
                Err(_) => name.child(&segment.to_lowercase()),
            };
        }
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> PropertyName {
        PropertyName::parse(s).unwrap()
    }

    #[test]
    fn test_maps_prefixed_variables() {
        let source = EnvSource::new("MYAPP", "__").read_vars([
            ("MYAPP__SERVER__PORT", "8080"),
            ("MYAPP__SERVER__MAX_SIZE", "10MB"),
            ("MYAPP__HOSTS__0", "a"),
            ("OTHER__SERVER__PORT", "1"),
        ]);

        assert_eq!(source.len(), 3);
        assert_eq!(
            source.get(&name("server.port")).unwrap().value,
            Value::String("8080".into())
        );
        assert!(source.get(&name("server.max-size")).is_some());
        assert!(source.get(&name("hosts[0]")).is_some());
        assert_eq!(source.get(&name("server.max-size")).unwrap().name.to_string(), "server.max_size");
    }

    #[test]
    fn test_skips_empty_segments() {
        let source = EnvSource::new("APP", "_").read_vars([("APP_", "x"), ("APP_A__B", "y"), ("APP_C", "z")]);
        assert_eq!(source.len(), 1);
        assert!(source.get(&name("c")).is_some());
    }

    #[test]
    fn test_env_source_is_system() {
        let source = EnvSource::new("APP", "__").read_vars(Vec::<(String, String)>::new());
        assert!(source.is_system());
        assert_eq!(source.name(), "env:APP");
    }

    #[test]
    #[should_panic(expected = "separator must not be empty")]
    fn test_empty_separator_panics() {
        EnvSource::new("APP", "");
    }
}

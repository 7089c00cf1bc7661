use std::env;

/// Process-startup configuration. Read once from the environment by the
/// binary's `main`; nothing inside the reactor consults the environment
/// directly.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: "127.0.0.1".to_string(),
            port: 1234,
        }
    }
}

impl Config {
    /// Overlays `RKV_BIND_ADDR`/`RKV_PORT` onto the defaults. An unparsable
    /// `RKV_PORT` is ignored in favor of the default rather than treated as
    /// fatal, since a malformed env var shouldn't prevent local testing.
    pub fn from_env() -> Self {
        let mut cfg = Config::default();
        if let Ok(addr) = env::var("RKV_BIND_ADDR") {
            cfg.bind_addr = addr;
        }
        if let Ok(port) = env::var("RKV_PORT") {
            if let Ok(port) = port.parse() {
                cfg.port = port;
            }
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_env() {
        let cfg = Config::default();
        assert_eq!(cfg.bind_addr, "127.0.0.1");
        assert_eq!(cfg.port, 1234);
    }

    #[test]
    fn bad_port_falls_back_to_default() {
        env::set_var("RKV_PORT", "not-a-number");
        let cfg = Config::from_env();
        assert_eq!(cfg.port, 1234);
        env::remove_var("RKV_PORT");
    }

    #[test]
    fn explicit_env_vars_override_defaults() {
        env::set_var("RKV_BIND_ADDR", "0.0.0.0");
        env::set_var("RKV_PORT", "9999");
        let cfg = Config::from_env();
        assert_eq!(cfg.bind_addr, "0.0.0.0");
        assert_eq!(cfg.port, 9999);
        env::remove_var("RKV_BIND_ADDR");
        env::remove_var("RKV_PORT");
    }
}

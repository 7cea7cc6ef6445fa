use std::time::Duration;

use clap::{ArgGroup, Parser};

#[derive(Parser, Debug, Clone)]
#[command(name = "check_ttn_gateway")]
#[command(
    about = "Nagios/Icinga check for how long ago a The Things Stack gateway was last seen",
    version
)]
#[command(group(ArgGroup::new("verbosity").args(["quiet", "verbose"])))]
pub struct Config {
    /// Seconds since last seen before reporting WARNING
    #[arg(short, long, env = "TTN_CHECK_WARNING")]
    pub warning: u32,

    /// Seconds since last seen before reporting CRITICAL
    #[arg(short, long, env = "TTN_CHECK_CRITICAL")]
    pub critical: u32,

    /// ID of the gateway to check
    #[arg(short, long, env = "TTN_CHECK_GATEWAY")]
    pub gateway: String,

    /// Base URL of the cluster API, e.g. https://eu1.cloud.thethings.network
    #[arg(short, long, env = "TTN_SERVER")]
    pub server: String,

    /// API key with gateway status rights
    #[arg(short = 'k', long, env = "TTN_API_KEY", hide_env_values = true)]
    pub key: String,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Log debug output to stderr
    #[arg(short, long)]
    pub verbose: bool,

    /// Request timeout in milliseconds
    #[arg(long, env = "TTN_CHECK_TIMEOUT_MS", default_value_t = 10_000)]
    pub timeout_ms: u64,
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Log filter used when `RUST_LOG` is not set.
    pub fn log_directive(&self) -> &'static str {
        if self.quiet {
            "error"
        } else if self.verbose {
            "warn,check_ttn_gateway=debug"
        } else {
            "warn"
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::error::ErrorKind;

    use super::*;

    const REQUIRED: [&str; 11] = [
        "check_ttn_gateway",
        "-w",
        "300",
        "-c",
        "900",
        "-g",
        "eui-b827ebfffe000001",
        "-s",
        "https://eu1.cloud.thethings.network",
        "-k",
        "NNSXS.KEY",
    ];

    fn parse(extra: &[&str]) -> Result<Config, clap::Error> {
        Config::try_parse_from(REQUIRED.iter().chain(extra))
    }

    #[test]
    fn parses_short_flags() {
        let cfg = parse(&[]).unwrap();
        assert_eq!(cfg.warning, 300);
        assert_eq!(cfg.critical, 900);
        assert_eq!(cfg.gateway, "eui-b827ebfffe000001");
        assert_eq!(cfg.server, "https://eu1.cloud.thethings.network");
        assert_eq!(cfg.key, "NNSXS.KEY");
        assert_eq!(cfg.timeout(), Duration::from_secs(10));
        assert_eq!(cfg.log_directive(), "warn");
    }

    #[test]
    fn verbosity_flags() {
        assert_eq!(parse(&["-q"]).unwrap().log_directive(), "error");
        assert_eq!(
            parse(&["--verbose"]).unwrap().log_directive(),
            "warn,check_ttn_gateway=debug"
        );
        let err = parse(&["-q", "-v"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn negative_threshold_is_rejected() {
        let err = Config::try_parse_from([
            "check_ttn_gateway",
            "--warning=-5",
            "--critical=900",
            "--gateway=gw1",
            "--server=https://example.com",
            "--key=k",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn timeout_override() {
        let cfg = parse(&["--timeout-ms", "2500"]).unwrap();
        assert_eq!(cfg.timeout(), Duration::from_millis(2500));
    }
}

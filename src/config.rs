use crate::relay::DEFAULT_BLOCK_SIZE;

pub const MAX_BLOCK_SIZE: usize = 1 << 20;

/// How the aggregate exit status is derived once every child is reaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitPolicy {
    /// Exit 0 regardless of how the children ended.
    #[default]
    AlwaysZero,
    /// Exit with the highest child status (signals count as 128 + n).
    WorstChild,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub block_size: usize,
    pub exit_policy: ExitPolicy,
    pub report: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            exit_policy: ExitPolicy::AlwaysZero,
            report: false,
        }
    }
}

pub fn validate_run_config(cfg: &RunConfig) -> Result<(), String> {
    if cfg.block_size == 0 {
        return Err("block size must be at least 1 byte".to_string());
    }
    if cfg.block_size > MAX_BLOCK_SIZE {
        return Err(format!("block size must not exceed {} bytes", MAX_BLOCK_SIZE));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_faithful() {
        let cfg = RunConfig::default();
        assert_eq!(cfg.block_size, 1024);
        assert_eq!(cfg.exit_policy, ExitPolicy::AlwaysZero);
        assert!(!cfg.report);
        assert!(validate_run_config(&cfg).is_ok());
    }

    #[test]
    fn block_size_bounds() {
        let mut cfg = RunConfig::default();
        cfg.block_size = 0;
        assert!(validate_run_config(&cfg).is_err());
        cfg.block_size = MAX_BLOCK_SIZE;
        assert!(validate_run_config(&cfg).is_ok());
        cfg.block_size = MAX_BLOCK_SIZE + 1;
        assert!(validate_run_config(&cfg).is_err());
    }
}

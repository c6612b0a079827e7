use crate::lookback::LookbackConfig;

/// Internal validation, called automatically by `LookbackConfig::from_str` / `load`.
pub(crate) fn validate(config: &LookbackConfig) -> anyhow::Result<()> {
    if config.store.history.as_os_str().is_empty() {
        anyhow::bail!("store.history must not be empty");
    }

    let query = &config.query;
    if query.default_limit == 0 {
        anyhow::bail!("query.default_limit must be > 0");
    }
    if query.max_limit < query.default_limit {
        anyhow::bail!(
            "query.max_limit ({}) must be >= query.default_limit ({})",
            query.max_limit,
            query.default_limit,
        );
    }
    if query.fanout_parallelism == 0 {
        anyhow::bail!("query.fanout_parallelism must be > 0");
    }
    if query.timeout.is_zero() {
        anyhow::bail!("query.timeout must be > 0");
    }

    for (i, pattern) in config.allow_list.deny.iter().enumerate() {
        if pattern.trim().is_empty() {
            anyhow::bail!("allow_list.deny[{i}] must not be empty");
        }
    }

    Ok(())
}

//! Billing configuration

use crate::error::{BillingError, BillingResult};
use crate::proration::{ProrationPolicy, DEFAULT_CYCLE_DAYS};

/// Settings for the billing core, normally read from the environment
#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// Nominal billing cycle length used for upgrade proration
    pub proration_cycle_days: i64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            proration_cycle_days: DEFAULT_CYCLE_DAYS,
        }
    }
}

impl BillingConfig {
    /// Load from `BILLING_PRORATION_CYCLE_DAYS` (defaults to 30)
    pub fn from_env() -> BillingResult<Self> {
        match std::env::var("BILLING_PRORATION_CYCLE_DAYS") {
            Ok(raw) => Self::from_cycle_days(&raw),
            Err(_) => Ok(Self::default()),
        }
    }

    fn from_cycle_days(raw: &str) -> BillingResult<Self> {
        let days: i64 = raw.trim().parse().map_err(|_| {
            BillingError::Config(format!(
                "BILLING_PRORATION_CYCLE_DAYS must be an integer, got '{raw}'"
            ))
        })?;
        if days <= 0 {
            return Err(BillingError::Config(
                "BILLING_PRORATION_CYCLE_DAYS must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            proration_cycle_days: days,
        })
    }

    pub fn proration_policy(&self) -> ProrationPolicy {
        ProrationPolicy {
            cycle_days: self.proration_cycle_days,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cycle_is_thirty_days() {
        assert_eq!(BillingConfig::default().proration_policy().cycle_days, 30);
    }

    #[test]
    fn test_parse_cycle_days() {
        let config = BillingConfig::from_cycle_days(" 31 ").unwrap();
        assert_eq!(config.proration_cycle_days, 31);
    }

    #[test]
    fn test_rejects_non_positive_cycle() {
        assert!(matches!(
            BillingConfig::from_cycle_days("0"),
            Err(BillingError::Config(_))
        ));
        assert!(matches!(
            BillingConfig::from_cycle_days("monthly"),
            Err(BillingError::Config(_))
        ));
    }
}

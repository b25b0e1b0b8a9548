//! Forwarding rule CRUD on top of [`ConfigStore`].

use crate::config::{ConfigStore, ForwardingRule, NewRule};
use crate::error::{PanelError, Result};
use crate::utils::validation::validate_endpoint;
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// 1-indexed page selection. Absent, unparsable or non-positive values fall
/// back to the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub size: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: DEFAULT_PAGE, size: DEFAULT_PAGE_SIZE }
    }
}

impl PageRequest {
    pub fn from_query(page: Option<&str>, size: Option<&str>) -> Self {
        fn positive(value: Option<&str>) -> Option<usize> {
            value.and_then(|v| v.trim().parse::<i64>().ok()).filter(|v| *v > 0).map(|v| usize::try_from(v).unwrap_or(usize::MAX))
        }
        Self { page: positive(page).unwrap_or(DEFAULT_PAGE), size: positive(size).unwrap_or(DEFAULT_PAGE_SIZE) }
    }

    /// Index range of this page within `total` items, clamped to the list.
    fn bounds(&self, total: usize) -> (usize, usize) {
        let start = self.page.saturating_sub(1).saturating_mul(self.size).min(total);
        let end = start.saturating_add(self.size).min(total);
        (start, end)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RulePage {
    pub rules: Vec<ForwardingRule>,
    pub total: usize,
}

pub struct RuleService {
    store: Arc<ConfigStore>,
}

impl RuleService {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self { store }
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    /// One page of rules in file order, plus the total rule count.
    pub async fn list(&self, page: PageRequest) -> RulePage {
        self.store
            .read(|config| {
                let total = config.endpoints.len();
                let (start, end) = page.bounds(total);
                RulePage { rules: config.endpoints[start..end].to_vec(), total }
            })
            .await
    }

    /// Append a rule and rewrite the daemon config.
    pub async fn add(&self, rule: NewRule) -> Result<ForwardingRule> {
        validate_endpoint(&rule.listen).map_err(|e| PanelError::validation(format!("Invalid listen address: {e}")))?;
        validate_endpoint(&rule.remote).map_err(|e| PanelError::validation(format!("Invalid remote address: {e}")))?;

        let rule = ForwardingRule::from(rule);
        let stored = self
            .store
            .update(|config| {
                if config.find_rule(&rule.listen).is_some() {
                    return Err(PanelError::Conflict(format!("Listen address {} is already in use", rule.listen)));
                }
                config.endpoints.push(rule.clone());
                Ok(rule)
            })
            .await?;
        info!("Added forwarding rule {}", stored);
        Ok(stored)
    }

    /// Remove the rule listening on `listen`.
    ///
    /// The config file is rewritten even when nothing matched; the caller
    /// then gets [`PanelError::NotFound`].
    pub async fn delete(&self, listen: &str) -> Result<()> {
        validate_endpoint(listen).map_err(|e| PanelError::validation(format!("Invalid listen address: {e}")))?;

        let removed = self
            .store
            .update(|config| {
                Ok(config.endpoints.iter().position(|rule| rule.listen == listen).map(|index| config.endpoints.remove(index)))
            })
            .await?;
        match removed {
            Some(rule) => {
                info!("Removed forwarding rule {}", rule);
                Ok(())
            }
            None => {
                warn!("No forwarding rule listens on {}", listen);
                Err(PanelError::NotFound(format!("No forwarding rule listens on {}", listen)))
            }
        }
    }
}

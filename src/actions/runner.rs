/// Dispatches `ActionRequest`s to their handlers.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use super::configurations::{
    resolve_config, AuthenticateConfig, FetchDailySummaryConfig, PullObservationsConfig,
    PullStationConfig,
};
use super::handlers::{self, ActionContext};
use super::{ActionError, ActionId};
use crate::config::Integration;
use crate::scheduler::ActionRequest;

pub struct ActionRunner {
    integrations: HashMap<String, Integration>,
    ctx: ActionContext,
}

impl ActionRunner {
    pub fn new(integrations: Vec<Integration>, ctx: ActionContext) -> Self {
        let integrations = integrations
            .into_iter()
            .map(|integration| (integration.id.clone(), integration))
            .collect();
        Self { integrations, ctx }
    }

    /// Configured integration ids, sorted.
    pub fn integration_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.integrations.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn integration(&self, integration_id: &str) -> Option<&Integration> {
        self.integrations.get(integration_id)
    }

    /// Runs one action and returns its result document.
    pub fn execute(&self, request: &ActionRequest) -> Result<Value, ActionError> {
        let integration = self
            .integration(&request.integration_id)
            .ok_or_else(|| ActionError::IntegrationNotFound(request.integration_id.clone()))?;
        let action: ActionId = request.action_id.parse()?;
        let overrides = request.config_overrides.as_ref();

        log::debug!("Dispatching '{}' for integration {}", action, integration.id);

        let ctx = &self.ctx;
        match action {
            ActionId::Auth => {
                let config: AuthenticateConfig = resolve_config(integration, action, overrides, true)?;
                to_document(handlers::action_auth(ctx, integration, &config))
            }
            ActionId::PullObservations => {
                let config: PullObservationsConfig =
                    resolve_config(integration, action, overrides, true)?;
                to_document(handlers::action_pull_observations(ctx, integration, &config)?)
            }
            ActionId::PullStationConditions => {
                let config: PullStationConfig = resolve_config(integration, action, overrides, true)?;
                to_document(handlers::action_pull_station_conditions(ctx, integration, &config)?)
            }
            ActionId::PullStationHistory => {
                let config: PullStationConfig = resolve_config(integration, action, overrides, true)?;
                to_document(handlers::action_pull_station_history(ctx, integration, &config)?)
            }
            ActionId::FetchDailySummary => {
                let config: FetchDailySummaryConfig =
                    resolve_config(integration, action, overrides, false)?;
                to_document(handlers::action_fetch_daily_summary(ctx, integration, &config)?)
            }
        }
    }
}

fn to_document<T: Serialize>(result: T) -> Result<Value, ActionError> {
    serde_json::to_value(result).map_err(|e| ActionError::InvalidConfiguration(e.to_string()))
}

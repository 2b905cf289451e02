use std::{collections::HashMap, sync::Arc};

use tracing::{debug, info, warn};

use crate::{
    CityQuery, Config, Prediction, ProviderResult,
    error::{ProviderError, Unresolved},
    merge,
    provider::{self, ProviderId, WeatherProvider},
    remark::{GeminiRemarkWriter, RemarkWriter},
    routing::{EvidenceState, PriorityPolicy, RoutingDecision, RoutingPolicy},
};

/// Drives the routing policy and the provider adapters for one query at a time.
///
/// Shared state is read-only; each call to [`Orchestrator::run`] owns its own
/// [`EvidenceState`], so concurrent queries never see each other's results.
#[derive(Debug)]
pub struct Orchestrator {
    providers: HashMap<ProviderId, Arc<dyn WeatherProvider>>,
    policy: Arc<dyn RoutingPolicy>,
    remarks: Option<Arc<dyn RemarkWriter>>,
    step_budget: usize,
}

impl Orchestrator {
    /// Priority routing over the given adapters, without remark rewriting.
    pub fn new(providers: Vec<Arc<dyn WeatherProvider>>, step_budget: usize) -> Self {
        Self {
            providers: providers.into_iter().map(|p| (p.id(), p)).collect(),
            policy: Arc::new(PriorityPolicy),
            remarks: None,
            step_budget: step_budget.max(1),
        }
    }

    /// Build the production setup. Fails when a required secret is missing.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let credentials = config.credentials()?;
        let http = provider::http_client(config)?;
        let providers = provider::providers_from_config(config, &credentials, &http);

        let mut orchestrator = Self::new(providers, config.step_budget);
        if config.remarks {
            orchestrator = orchestrator.with_remarks(Arc::new(GeminiRemarkWriter::new(
                http,
                config.endpoints.gemini.clone(),
                config.gemini_model.clone(),
                credentials.google_api_key,
            )));
        }
        Ok(orchestrator)
    }

    pub fn with_policy(mut self, policy: Arc<dyn RoutingPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_remarks(mut self, writer: Arc<dyn RemarkWriter>) -> Self {
        self.remarks = Some(writer);
        self
    }

    /// Answer one query. Never fails: provider errors become evidence and an
    /// exhausted budget or provider chain yields a "no data" prediction.
    pub async fn run(&self, query: &CityQuery) -> Prediction {
        let mut evidence = EvidenceState::new();

        for step in 1..=self.step_budget {
            let provider = match self.policy.decide(query, &evidence) {
                RoutingDecision::Terminate(prediction) => {
                    info!(
                        city = query.name(),
                        step,
                        source = ?prediction.source,
                        outlook = ?prediction.outlook,
                        "Query resolved"
                    );
                    return self.finish(query, *prediction).await;
                }
                RoutingDecision::UseRegionalDb => ProviderId::RegionalDb,
                RoutingDecision::UsePrimaryForecast => ProviderId::PrimaryForecast,
                RoutingDecision::UseFallbackForecast => ProviderId::FallbackForecast,
            };

            debug!(city = query.name(), step, %provider, "Invoking provider");
            let result = self.invoke(provider, query).await;
            match &result {
                ProviderResult::Error(err) => warn!(
                    city = query.name(),
                    %provider,
                    code = err.code(),
                    "Provider failed: {}",
                    err
                ),
                other => info!(
                    city = query.name(),
                    %provider,
                    result = other.label(),
                    "Provider answered"
                ),
            }
            evidence.record(provider, result);
        }

        warn!(
            city = query.name(),
            budget = self.step_budget,
            calls = evidence.entries().len(),
            "Step budget exhausted, terminating with accumulated evidence"
        );
        let prediction = merge::merge_or(
            query,
            &evidence,
            Unresolved::StepBudgetExceeded(self.step_budget),
        );
        self.finish(query, prediction).await
    }

    async fn invoke(&self, id: ProviderId, query: &CityQuery) -> ProviderResult {
        match self.providers.get(&id) {
            Some(adapter) => adapter.fetch(query).await,
            None => ProviderResult::Error(ProviderError::Unavailable(format!(
                "no adapter registered for '{id}'"
            ))),
        }
    }

    async fn finish(&self, query: &CityQuery, mut prediction: Prediction) -> Prediction {
        let Some(writer) = &self.remarks else {
            return prediction;
        };
        if prediction.source.is_none() {
            return prediction;
        }

        match writer.write(query.name(), &prediction).await {
            Ok(text) => prediction.explanation = text,
            Err(err) => warn!(city = query.name(), "Keeping built-in remark: {:#}", err),
        }
        prediction
    }
}

//! Provider selection: which source to consult next for a query, given what
//! the previous calls returned.

use std::fmt::Debug;

use crate::{
    CityQuery, Prediction, ProviderResult, WeatherPayload, merge,
    provider::{ProviderId, regional_db},
};

/// One recorded adapter call.
#[derive(Debug, Clone, PartialEq)]
pub struct Evidence {
    pub provider: ProviderId,
    pub result: ProviderResult,
}

/// Append-only record of the provider calls made for one query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvidenceState {
    entries: Vec<Evidence>,
}

impl EvidenceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, provider: ProviderId, result: ProviderResult) {
        self.entries.push(Evidence { provider, result });
    }

    pub fn entries(&self) -> &[Evidence] {
        &self.entries
    }

    pub fn tried(&self, provider: ProviderId) -> bool {
        self.entries.iter().any(|e| e.provider == provider)
    }

    /// Latest result recorded for a provider.
    pub fn latest(&self, provider: ProviderId) -> Option<&ProviderResult> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.provider == provider)
            .map(|e| &e.result)
    }

    /// The successful payload of the highest-priority provider, if any.
    pub fn best_success(&self) -> Option<(ProviderId, &WeatherPayload)> {
        ProviderId::all().iter().find_map(|id| {
            self.entries.iter().find_map(|e| match &e.result {
                ProviderResult::Success(payload) if e.provider == *id => Some((*id, payload)),
                _ => None,
            })
        })
    }

    /// Providers in the order they were called, without repeats.
    pub fn attempted(&self) -> Vec<ProviderId> {
        let mut out: Vec<ProviderId> = Vec::with_capacity(self.entries.len());
        for e in &self.entries {
            if !out.contains(&e.provider) {
                out.push(e.provider);
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoutingDecision {
    UseRegionalDb,
    UsePrimaryForecast,
    UseFallbackForecast,
    Terminate(Box<Prediction>),
}

pub trait RoutingPolicy: Send + Sync + Debug {
    fn decide(&self, query: &CityQuery, evidence: &EvidenceState) -> RoutingDecision;
}

/// Fixed priority chain: regional dataset, then the hourly forecast, then the
/// daily satellite aggregates. Stops at the first success.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityPolicy;

impl PriorityPolicy {
    /// Regional data is skipped for detailed queries since it has no hourly series.
    pub fn regional_applies(query: &CityQuery) -> bool {
        !query.is_detailed() && regional_db::is_supported_city(query.name())
    }
}

impl RoutingPolicy for PriorityPolicy {
    fn decide(&self, query: &CityQuery, evidence: &EvidenceState) -> RoutingDecision {
        if evidence.best_success().is_some() {
            return RoutingDecision::Terminate(Box::new(merge::merge(query, evidence)));
        }

        if Self::regional_applies(query) && !evidence.tried(ProviderId::RegionalDb) {
            return RoutingDecision::UseRegionalDb;
        }

        if !evidence.tried(ProviderId::PrimaryForecast) {
            return RoutingDecision::UsePrimaryForecast;
        }

        let primary_failed = matches!(
            evidence.latest(ProviderId::PrimaryForecast),
            Some(ProviderResult::Error(_) | ProviderResult::Empty)
        );
        if primary_failed && !evidence.tried(ProviderId::FallbackForecast) {
            return RoutingDecision::UseFallbackForecast;
        }

        RoutingDecision::Terminate(Box::new(merge::merge(query, evidence)))
    }
}

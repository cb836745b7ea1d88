//! Runs the external lookup chosen by the classifier.

use std::sync::Arc;

use wayfarer_core::types::{AnalysisResult, ExternalDataBag, FunctionChoice};
use wayfarer_data::ExternalDataGateway;

/// Executes an [`AnalysisResult`]'s function choice against the gateway.
pub struct FunctionExecutor {
    gateway: Arc<ExternalDataGateway>,
}

impl FunctionExecutor {
    pub fn new(gateway: Arc<ExternalDataGateway>) -> Self {
        Self { gateway }
    }

    /// Fetch the data `analysis` asks for.
    ///
    /// Returns an empty bag for `none` or a blank argument; the gateway is
    /// not called in either case. A lookup that yields nothing leaves its
    /// key absent.
    pub async fn run(&self, analysis: &AnalysisResult) -> ExternalDataBag {
        let mut bag = ExternalDataBag::default();
        let args = &analysis.function_args;

        match analysis.function_to_call {
            FunctionChoice::None => {}
            FunctionChoice::GetWeather => {
                let city = args.city.trim();
                if city.is_empty() {
                    tracing::debug!("Weather lookup requested without a city, skipping");
                } else {
                    bag.weather = self.gateway.get_weather(city).await;
                }
            }
            FunctionChoice::GetCountryInfo => {
                let country = args.country.trim();
                if country.is_empty() {
                    tracing::debug!("Country lookup requested without a country, skipping");
                } else {
                    bag.country = self.gateway.get_country_info(country).await;
                }
            }
        }

        tracing::debug!(
            function = %analysis.function_to_call,
            keys = ?bag.keys(),
            "External functions executed"
        );
        bag
    }
}

//! Orchestrator settings: redirect targets, currency and billing interval.

use crate::flow;

/// Default path (appended to the client URL) the provider redirects to after payment.
pub const DEFAULT_SUCCESS_PATH: &str = "/profile?session_id={CHECKOUT_SESSION_ID}";

/// Default path (appended to the client URL) the provider redirects to on cancel.
pub const DEFAULT_CANCEL_PATH: &str = "/souscription";

/// Frontend redirect targets handed to the provider on session creation.
///
/// The success path may contain [`flow::SESSION_ID_PLACEHOLDER`], which the
/// provider replaces with the session ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTargets {
    client_url: String,
    success_path: String,
    cancel_path: String,
}

impl RedirectTargets {
    /// Creates redirect targets for the given frontend base URL with the default paths.
    pub fn new(client_url: impl Into<String>) -> Self {
        let client_url = client_url.into();
        Self {
            client_url: client_url.trim_end_matches('/').to_string(),
            success_path: DEFAULT_SUCCESS_PATH.to_string(),
            cancel_path: DEFAULT_CANCEL_PATH.to_string(),
        }
    }

    /// Replaces the success and cancel paths.
    pub fn with_paths(mut self, success_path: impl Into<String>, cancel_path: impl Into<String>) -> Self {
        self.success_path = success_path.into();
        self.cancel_path = cancel_path.into();
        self
    }

    /// Returns the frontend base URL.
    pub fn client_url(&self) -> &str {
        &self.client_url
    }

    /// Returns the absolute success URL.
    pub fn success_url(&self) -> String {
        join(&self.client_url, &self.success_path)
    }

    /// Returns the absolute cancel URL.
    pub fn cancel_url(&self) -> String {
        join(&self.client_url, &self.cancel_path)
    }

    /// Returns true if the success URL carries the session ID placeholder.
    pub fn success_carries_session_id(&self) -> bool {
        self.success_path.contains(flow::SESSION_ID_PLACEHOLDER)
    }
}

fn join(base: &str, path: &str) -> String {
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// Billing interval of recurring prices created for subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecurringInterval {
    Day,
    Week,
    #[default]
    Month,
    Year,
}

impl RecurringInterval {
    /// Returns the interval name as understood by the provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurringInterval::Day => "day",
            RecurringInterval::Week => "week",
            RecurringInterval::Month => "month",
            RecurringInterval::Year => "year",
        }
    }
}

impl std::fmt::Display for RecurringInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RecurringInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(RecurringInterval::Day),
            "week" => Ok(RecurringInterval::Week),
            "month" => Ok(RecurringInterval::Month),
            "year" => Ok(RecurringInterval::Year),
            other => Err(format!("unknown recurring interval: {other}")),
        }
    }
}

/// Settings shared by every checkout run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSettings {
    pub redirects: RedirectTargets,
    pub currency: String,
    pub recurring_interval: RecurringInterval,
}

impl CheckoutSettings {
    /// Creates settings for the given frontend base URL, in the default currency
    /// with monthly billing.
    pub fn new(client_url: impl Into<String>) -> Self {
        Self {
            redirects: RedirectTargets::new(client_url),
            currency: flow::DEFAULT_CURRENCY.to_string(),
            recurring_interval: RecurringInterval::default(),
        }
    }

    /// Replaces the currency.
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into().to_ascii_lowercase();
        self
    }

    /// Replaces the recurring interval.
    pub fn with_recurring_interval(mut self, interval: RecurringInterval) -> Self {
        self.recurring_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_redirects() {
        let targets = RedirectTargets::new("https://shop.example");
        assert_eq!(
            targets.success_url(),
            "https://shop.example/profile?session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(targets.cancel_url(), "https://shop.example/souscription");
        assert!(targets.success_carries_session_id());
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let targets = RedirectTargets::new("https://shop.example/");
        assert_eq!(targets.client_url(), "https://shop.example");
        assert_eq!(targets.cancel_url(), "https://shop.example/souscription");
    }

    #[test]
    fn test_custom_paths() {
        let targets = RedirectTargets::new("http://localhost:5173")
            .with_paths("success", "/pricing");
        assert_eq!(targets.success_url(), "http://localhost:5173/success");
        assert_eq!(targets.cancel_url(), "http://localhost:5173/pricing");
        assert!(!targets.success_carries_session_id());
    }

    #[test]
    fn test_settings_defaults() {
        let settings = CheckoutSettings::new("http://localhost:3000");
        assert_eq!(settings.currency, "eur");
        assert_eq!(settings.recurring_interval, RecurringInterval::Month);
    }

    #[test]
    fn test_currency_is_lowercased() {
        let settings = CheckoutSettings::new("http://localhost:3000").with_currency("USD");
        assert_eq!(settings.currency, "usd");
    }

    #[test]
    fn test_interval_parsing() {
        assert_eq!("Year".parse::<RecurringInterval>(), Ok(RecurringInterval::Year));
        assert!("fortnight".parse::<RecurringInterval>().is_err());
        assert_eq!(RecurringInterval::Month.to_string(), "month");
    }
}

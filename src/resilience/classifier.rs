//! Error classification.
//!
//! Decides whether a failure is a transient connection error (the host is
//! unusable) or a serialization failure (the host is fine, the transaction
//! must be retried). Anything else is left unclassified and is never retried.
//!
//! Errors are routinely wrapped on their way up (query layer, templates,
//! application errors), so every check walks the whole `source()` chain.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use crate::config::ClassifierConfig;
use crate::error::Error;

/// Predicate applied to one error in a cause chain.
pub type ErrorMatcher = Arc<dyn Fn(&(dyn StdError + 'static)) -> bool + Send + Sync>;

/// Iterate over an error and everything it wraps, outermost first.
pub fn causes<'a>(
    err: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(err), |&e| e.source())
}

#[derive(Clone, Default)]
pub struct ErrorClassifier {
    connection_matchers: Vec<ErrorMatcher>,
    connection_messages: Vec<String>,
    serialization_matchers: Vec<ErrorMatcher>,
}

impl fmt::Debug for ErrorClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorClassifier")
            .field("connection_matchers", &self.connection_matchers.len())
            .field("connection_messages", &self.connection_messages)
            .field("serialization_matchers", &self.serialization_matchers.len())
            .finish()
    }
}

impl ErrorClassifier {
    /// A classifier that matches nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the classifier described by the configuration.
    pub fn from_config(config: &ClassifierConfig) -> Self {
        let connection_states = config.connection_sqlstates.clone();
        let serialization_states = config.serialization_sqlstates.clone();

        let mut classifier = Self::new()
            .with_connection_matcher(|err| {
                matches!(
                    err.downcast_ref::<Error>(),
                    Some(Error::Connection { .. } | Error::HostOffline { .. })
                )
            })
            .with_connection_matcher(move |err| sqlstate_in(err, &connection_states))
            .with_serialization_matcher(move |err| sqlstate_in(err, &serialization_states));

        for message in &config.connection_messages {
            classifier = classifier.with_connection_message(message.clone());
        }
        classifier
    }

    /// Treat any `T` in a cause chain as a connection error.
    pub fn with_connection_error<T: StdError + 'static>(self) -> Self {
        self.with_connection_matcher(|err| err.is::<T>())
    }

    /// Treat any `T` in a cause chain as a serialization failure.
    pub fn with_serialization_failure<T: StdError + 'static>(self) -> Self {
        self.with_serialization_matcher(|err| err.is::<T>())
    }

    pub fn with_connection_matcher<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&(dyn StdError + 'static)) -> bool + Send + Sync + 'static,
    {
        self.connection_matchers.push(Arc::new(matcher));
        self
    }

    pub fn with_serialization_matcher<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&(dyn StdError + 'static)) -> bool + Send + Sync + 'static,
    {
        self.serialization_matchers.push(Arc::new(matcher));
        self
    }

    /// Treat errors whose message contains `fragment` as connection errors.
    ///
    /// Some drivers report a lost connection as an unrelated error, e.g. a
    /// failed client encoding negotiation.
    pub fn with_connection_message(mut self, fragment: impl Into<String>) -> Self {
        self.connection_messages.push(fragment.into());
        self
    }

    /// True if the error, or anything it wraps, is a connection error.
    pub fn is_connection_error(&self, err: &(dyn StdError + 'static)) -> bool {
        causes(err).any(|e| {
            self.connection_matchers.iter().any(|m| m(e)) || self.message_matches(e)
        })
    }

    /// True if the error, or anything it wraps, is a serialization failure.
    pub fn is_serialization_failure(&self, err: &(dyn StdError + 'static)) -> bool {
        causes(err).any(|e| self.serialization_matchers.iter().any(|m| m(e)))
    }

    fn message_matches(&self, err: &(dyn StdError + 'static)) -> bool {
        if self.connection_messages.is_empty() {
            return false;
        }
        let message = err.to_string();
        self.connection_messages.iter().any(|f| message.contains(f.as_str()))
    }
}

fn sqlstate_in(err: &(dyn StdError + 'static), states: &[String]) -> bool {
    err.downcast_ref::<Error>()
        .and_then(Error::sqlstate)
        .is_some_and(|code| states.iter().any(|s| s == code))
}

//! Inbound turn

use crate::channel::Channel;

/// One inbound fulfillment request, immutable once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    intent: String,
    locale: String,
    channel: Channel,
    session: String,
}

impl Turn {
    pub fn new(
        intent: impl Into<String>,
        locale: impl Into<String>,
        channel: Channel,
        session: impl Into<String>,
    ) -> Self {
        Self {
            intent: intent.into(),
            locale: locale.into(),
            channel,
            session: session.into(),
        }
    }

    /// Recognized intent identifier
    pub fn intent(&self) -> &str {
        &self.intent
    }

    /// Language tag as sent by the platform (e.g. `en-US`)
    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Session the turn belongs to
    pub fn session(&self) -> &str {
        &self.session
    }
}

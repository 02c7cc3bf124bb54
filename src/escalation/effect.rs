//! Effects produced by escalation transitions

use crate::catalog::{CatalogName, VariantIndex};

/// Effects to be executed after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Replace the helper context with this counter and lifespan
    PersistCount { fallback_count: u32, lifespan: u32 },

    /// Send a catalog message, shaped for the turn's channel
    Reply {
        catalog: CatalogName,
        index: VariantIndex,
        expect_more_input: bool,
    },
}

impl Effect {
    pub fn persist_count(fallback_count: u32) -> Self {
        Effect::PersistCount {
            fallback_count,
            lifespan: super::CONTEXT_LIFESPAN,
        }
    }

    pub fn ask(catalog: CatalogName, index: VariantIndex) -> Self {
        Effect::Reply {
            catalog,
            index,
            expect_more_input: true,
        }
    }

    pub fn close(catalog: CatalogName, index: VariantIndex) -> Self {
        Effect::Reply {
            catalog,
            index,
            expect_more_input: false,
        }
    }
}

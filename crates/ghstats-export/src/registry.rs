//! Exporter registry.
//!
//! A static table of every exporter the CLI can run. Each entry builds a
//! boxed [`Exporter`] for a window configuration.

use crate::aggregate::{
    CreateDetail, DeleteDetail, DetailAggregator, EventRows, PushDetail, TypeCounter, UserCounter,
    WatchDetail,
};
use crate::sink::OutputFormat;
use crate::window::{Exporter, WindowConfig, WindowEngine};
use crate::{Error, Result};

/// One registered exporter.
pub struct ExporterEntry {
    pub name: &'static str,
    pub description: &'static str,
    /// Format used when the CLI does not force one.
    pub default_format: OutputFormat,
    build: fn(&WindowConfig) -> Box<dyn Exporter>,
}

impl ExporterEntry {
    pub fn build(&self, config: &WindowConfig) -> Box<dyn Exporter> {
        (self.build)(config)
    }
}

impl std::fmt::Debug for ExporterEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExporterEntry")
            .field("name", &self.name)
            .field("default_format", &self.default_format)
            .finish_non_exhaustive()
    }
}

pub static EXPORTERS: &[ExporterEntry] = &[
    ExporterEntry {
        name: "type",
        description: "Event counts per normalized type per window",
        default_format: OutputFormat::Csv,
        build: |c| Box::new(WindowEngine::new("type", TypeCounter, c)),
    },
    ExporterEntry {
        name: "user",
        description: "Event counts per type/actor/repo per window",
        default_format: OutputFormat::Ndjson,
        build: |c| Box::new(WindowEngine::new("user", UserCounter, c)),
    },
    ExporterEntry {
        name: "push",
        description: "Push statistics per user/org/repo/ref per window",
        default_format: OutputFormat::Csv,
        build: |c| Box::new(WindowEngine::new("push", DetailAggregator(PushDetail), c)),
    },
    ExporterEntry {
        name: "create",
        description: "Branch and tag creations per window",
        default_format: OutputFormat::Csv,
        build: |c| Box::new(WindowEngine::new("create", DetailAggregator(CreateDetail), c)),
    },
    ExporterEntry {
        name: "delete",
        description: "Branch and tag deletions per window",
        default_format: OutputFormat::Csv,
        build: |c| Box::new(WindowEngine::new("delete", DetailAggregator(DeleteDetail), c)),
    },
    ExporterEntry {
        name: "watch",
        description: "Stars per user/repo per window",
        default_format: OutputFormat::Csv,
        build: |c| Box::new(WindowEngine::new("watch", DetailAggregator(WatchDetail), c)),
    },
    ExporterEntry {
        name: "events",
        description: "One row per event (id, date, type, actor, repo, action, size)",
        default_format: OutputFormat::Csv,
        build: |_| Box::new(EventRows::new()),
    },
];

/// Find an exporter by name.
pub fn lookup(name: &str) -> Result<&'static ExporterEntry> {
    EXPORTERS
        .iter()
        .find(|e| e.name == name)
        .ok_or_else(|| Error::UnknownExporter(name.to_string()))
}

/// Registered exporter names, in table order.
pub fn names() -> Vec<&'static str> {
    EXPORTERS.iter().map(|e| e.name).collect()
}

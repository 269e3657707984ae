//! Static catalog of configured upstream sources.

use crate::models::{Encoding, IngestionMethod, SourceDescriptor};

/// Built-in catalog, in declaration order.
pub const SOURCES: &[SourceDescriptor] = &[
    SourceDescriptor {
        id: "sejm",
        name: "Sejm RP - ELI API",
        institution: "Kancelaria Sejmu",
        endpoint: "https://api.sejm.gov.pl/eli/acts/DU/2024",
        encoding: Encoding::LinkedDataJson,
        method: IngestionMethod::StructuredApi,
        active: true,
        priority: 1,
        category: "ustawa",
        detail_endpoint: Some("https://api.sejm.gov.pl/eli/acts/{id}"),
        fallback_endpoint: None,
    },
    SourceDescriptor {
        id: "isap",
        name: "Internetowy System Aktów Prawnych",
        institution: "Kancelaria Sejmu",
        endpoint: "https://isap.sejm.gov.pl/api/isap/acts",
        encoding: Encoding::Auto,
        method: IngestionMethod::StructuredApi,
        active: true,
        priority: 2,
        category: "legal_act",
        detail_endpoint: None,
        fallback_endpoint: None,
    },
    SourceDescriptor {
        id: "du",
        name: "Dziennik Ustaw - ELI",
        institution: "Rządowe Centrum Legislacji",
        endpoint: "https://dziennikustaw.gov.pl/eli/DU",
        encoding: Encoding::RdfXml,
        method: IngestionMethod::StructuredApi,
        active: true,
        priority: 2,
        category: "legal_act",
        detail_endpoint: None,
        fallback_endpoint: None,
    },
    SourceDescriptor {
        id: "mp",
        name: "Monitor Polski - ELI",
        institution: "Rządowe Centrum Legislacji",
        endpoint: "https://monitorpolski.gov.pl/eli/MP",
        encoding: Encoding::Turtle,
        method: IngestionMethod::StructuredApi,
        active: true,
        priority: 3,
        category: "obwieszczenie",
        detail_endpoint: None,
        fallback_endpoint: None,
    },
    SourceDescriptor {
        id: "gov-mz",
        name: "Ministerstwo Zdrowia - komunikaty",
        institution: "Ministerstwo Zdrowia",
        endpoint: "https://www.gov.pl/web/zdrowie/rss",
        encoding: Encoding::Auto,
        method: IngestionMethod::Feed,
        active: true,
        priority: 4,
        category: "notice",
        detail_endpoint: None,
        fallback_endpoint: None,
    },
    SourceDescriptor {
        id: "gov-mf",
        name: "Ministerstwo Finansów - komunikaty",
        institution: "Ministerstwo Finansów",
        endpoint: "https://www.gov.pl/web/finanse/rss",
        encoding: Encoding::Auto,
        method: IngestionMethod::Feed,
        active: true,
        priority: 4,
        category: "notice",
        detail_endpoint: None,
        fallback_endpoint: None,
    },
    SourceDescriptor {
        id: "nfz",
        name: "Narodowy Fundusz Zdrowia - zarządzenia Prezesa",
        institution: "Narodowy Fundusz Zdrowia",
        endpoint: "https://www.nfz.gov.pl/rss/zarzadzenia-prezesa.xml",
        encoding: Encoding::Auto,
        method: IngestionMethod::Feed,
        active: true,
        priority: 5,
        category: "zarządzenie",
        detail_endpoint: None,
        fallback_endpoint: None,
    },
    SourceDescriptor {
        id: "zus",
        name: "ZUS - aktualności",
        institution: "Zakład Ubezpieczeń Społecznych",
        endpoint: "https://www.zus.pl/rss/aktualnosci",
        encoding: Encoding::Auto,
        method: IngestionMethod::Feed,
        active: false,
        priority: 6,
        category: "notice",
        detail_endpoint: None,
        fallback_endpoint: None,
    },
    SourceDescriptor {
        id: "rcl",
        name: "Rządowy Proces Legislacyjny",
        institution: "Rządowe Centrum Legislacji",
        endpoint: "https://legislacja.gov.pl/lista",
        encoding: Encoding::Auto,
        method: IngestionMethod::BrowserScrape,
        active: true,
        priority: 7,
        category: "projekt",
        detail_endpoint: None,
        fallback_endpoint: Some("https://legislacja.gov.pl/"),
    },
];

/// Read-only view over a source catalog.
#[derive(Debug, Clone, Copy)]
pub struct SourceRegistry {
    sources: &'static [SourceDescriptor],
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SourceRegistry {
    pub fn builtin() -> Self {
        Self { sources: SOURCES }
    }

    pub fn from_static(sources: &'static [SourceDescriptor]) -> Self {
        Self { sources }
    }

    pub fn all(&self) -> &'static [SourceDescriptor] {
        self.sources
    }

    /// Active sources ordered by priority ascending; ties keep declaration order.
    pub fn list_active(&self) -> Vec<&'static SourceDescriptor> {
        let mut active: Vec<&'static SourceDescriptor> =
            self.sources.iter().filter(|s| s.active).collect();
        // stable sort keeps declaration order among equal priorities
        active.sort_by_key(|s| s.priority);
        active
    }

    /// Active sources of one family, same ordering as [`Self::list_active`].
    pub fn active_for(&self, method: IngestionMethod) -> Vec<&'static SourceDescriptor> {
        self.list_active()
            .into_iter()
            .filter(|s| s.method == method)
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&'static SourceDescriptor> {
        self.sources.iter().find(|s| s.id == id)
    }
}

//! Crawlable regions of the registry
//!
//! The registry partitions its search by German federal state. The `code`
//! is inserted into the search URL verbatim; the site expects Latin-1
//! percent escapes for umlauts, so codes must never be re-encoded.

/// A searchable region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    /// Value of the `bundesland` query parameter, already percent-encoded
    pub code: &'static str,

    /// Human-readable name
    pub name: &'static str,
}

/// All regions the registry can be searched by
pub const REGIONS: [Region; 16] = [
    Region {
        code: "Baden-W%FCrttemberg",
        name: "Baden-Württemberg",
    },
    Region {
        code: "Bayern",
        name: "Bayern",
    },
    Region {
        code: "Berlin",
        name: "Berlin",
    },
    Region {
        code: "Brandenburg",
        name: "Brandenburg",
    },
    Region {
        code: "Bremen",
        name: "Bremen",
    },
    Region {
        code: "Hamburg",
        name: "Hamburg",
    },
    Region {
        code: "Hessen",
        name: "Hessen",
    },
    Region {
        code: "Mecklenburg-Vorpommern",
        name: "Mecklenburg-Vorpommern",
    },
    Region {
        code: "Niedersachsen",
        name: "Niedersachsen",
    },
    Region {
        code: "Nordrhein-Westfalen",
        name: "Nordrhein-Westfalen",
    },
    Region {
        code: "Rheinland-Pfalz",
        name: "Rheinland-Pfalz",
    },
    Region {
        code: "Saarland",
        name: "Saarland",
    },
    Region {
        code: "Sachsen",
        name: "Sachsen",
    },
    Region {
        code: "Sachsen-Anhalt",
        name: "Sachsen-Anhalt",
    },
    Region {
        code: "Schleswig-Holstein",
        name: "Schleswig-Holstein",
    },
    Region {
        code: "Th%FCringen",
        name: "Thüringen",
    },
];

impl Region {
    /// Looks a region up by code or display name (case-insensitive)
    pub fn find(query: &str) -> Option<Region> {
        let query = query.trim();
        REGIONS.iter().copied().find(|r| {
            r.code.eq_ignore_ascii_case(query) || r.name.to_lowercase() == query.to_lowercase()
        })
    }

    /// Lowercase, underscore-separated name for file names
    pub fn slug(&self) -> String {
        self.name.replace(' ', "_").to_lowercase()
    }
}

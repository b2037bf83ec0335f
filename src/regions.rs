//! Static registry of bidding zones served by the dashboard.

use serde::Serialize;

/// One market region (bidding zone) with its upstream code and display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Region {
    pub code: &'static str,
    pub name: &'static str,
}

/// Every zone the upstream API serves without restriction.
///
/// DE-AT-LU exists upstream but errors on every request, so it is left out.
pub const ALL_REGIONS: [Region; 15] = [
    Region { code: "AT", name: "Austria" },
    Region { code: "BE", name: "Belgium" },
    Region { code: "CH", name: "Switzerland" },
    Region { code: "CZ", name: "Czech Republic" },
    Region { code: "DE-LU", name: "Germany, Luxembourg" },
    Region { code: "DK1", name: "Denmark 1" },
    Region { code: "DK2", name: "Denmark 2" },
    Region { code: "FR", name: "France" },
    Region { code: "HU", name: "Hungary" },
    Region { code: "IT-North", name: "Italy North" },
    Region { code: "NL", name: "Netherlands" },
    Region { code: "NO2", name: "Norway 2" },
    Region { code: "PL", name: "Poland" },
    Region { code: "SE4", name: "Sweden 4" },
    Region { code: "SI", name: "Slovenia" },
];

/// Exact, case-sensitive lookup. Codes are upstream identifiers, not user
/// text, so no normalization is applied.
pub fn find_region(code: &str) -> Option<&'static Region> {
    ALL_REGIONS.iter().find(|region| region.code == code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_fifteen_unique_codes() {
        assert_eq!(ALL_REGIONS.len(), 15);
        let mut codes: Vec<&str> = ALL_REGIONS.iter().map(|r| r.code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), 15);
    }

    #[test]
    fn lookup_is_case_sensitive() {
        assert_eq!(find_region("DE-LU").map(|r| r.name), Some("Germany, Luxembourg"));
        assert!(find_region("de-lu").is_none());
        assert!(find_region("DE-AT-LU").is_none());
    }
}

use std::fmt;

/// iDO's closed sport vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SportType {
    Bike,
    Run,
    Walk,
    Swim,
}

/// Used for any Garmin type without an entry in the table.
pub const DEFAULT_SPORT_TYPE: SportType = SportType::Bike;

impl SportType {
    pub const fn as_str(self) -> &'static str {
        match self {
            SportType::Bike => "bike",
            SportType::Run => "run",
            SportType::Walk => "walk",
            SportType::Swim => "swim",
        }
    }

    /// Exact, case-sensitive lookup of a Garmin type key.
    pub fn lookup(garmin_type: &str) -> Option<Self> {
        match garmin_type {
            "cycling" | "road_biking" | "mountain_biking" | "gravel_cycling" | "indoor_cycling"
            | "virtual_ride" => Some(SportType::Bike),
            "running" | "trail_running" | "treadmill" => Some(SportType::Run),
            "walking" | "hiking" => Some(SportType::Walk),
            "swimming" => Some(SportType::Swim),
            _ => None,
        }
    }
}

impl fmt::Display for SportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Total mapping: unknown types fall back to [`DEFAULT_SPORT_TYPE`] instead of failing.
/// Callers that want to flag the fallback can check [`SportType::lookup`] first.
pub fn map_type(garmin_type: &str) -> SportType {
    SportType::lookup(garmin_type).unwrap_or(DEFAULT_SPORT_TYPE)
}

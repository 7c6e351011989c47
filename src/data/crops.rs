use crate::shared::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropDef {
    pub kind: CropKind,
    /// Market anchor price the random walk reverts to.
    pub base_price: u32,
    /// Seconds from planting to ripe with no watering or fertilizer.
    pub growth_secs: f32,
    pub seasons: &'static [Season],
}

/// Indexed by `CropKind::index`.
///
///   Spring: carrot, potato, strawberry
///   Summer: tomato, corn, melon, wheat
///   Fall:   carrot, corn, pumpkin, wheat
///   Winter: nothing is in season
pub const CROPS: [CropDef; 8] = [
    CropDef {
        kind: CropKind::Carrot,
        base_price: 6,
        growth_secs: 60.0,
        seasons: &[Season::Spring, Season::Fall],
    },
    CropDef {
        kind: CropKind::Wheat,
        base_price: 4,
        growth_secs: 45.0,
        seasons: &[Season::Summer, Season::Fall],
    },
    CropDef {
        kind: CropKind::Tomato,
        base_price: 8,
        growth_secs: 90.0,
        seasons: &[Season::Summer],
    },
    CropDef {
        kind: CropKind::Corn,
        base_price: 10,
        growth_secs: 100.0,
        seasons: &[Season::Summer, Season::Fall],
    },
    CropDef {
        kind: CropKind::Potato,
        base_price: 7,
        growth_secs: 70.0,
        seasons: &[Season::Spring],
    },
    CropDef {
        kind: CropKind::Pumpkin,
        base_price: 18,
        growth_secs: 150.0,
        seasons: &[Season::Fall],
    },
    CropDef {
        kind: CropKind::Strawberry,
        base_price: 12,
        growth_secs: 80.0,
        seasons: &[Season::Spring],
    },
    CropDef {
        kind: CropKind::Melon,
        base_price: 22,
        growth_secs: 140.0,
        seasons: &[Season::Summer],
    },
];

pub fn crop_def(kind: CropKind) -> &'static CropDef {
    &CROPS[kind.index()]
}

pub fn in_season(kind: CropKind, season: Season) -> bool {
    crop_def(kind).seasons.contains(&season)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_indexed_by_kind() {
        for kind in CropKind::ALL {
            assert_eq!(crop_def(kind).kind, kind);
        }
    }

    #[test]
    fn test_corn_is_a_summer_crop() {
        assert!(in_season(CropKind::Corn, Season::Summer));
        assert!(!in_season(CropKind::Corn, Season::Winter));
    }
}

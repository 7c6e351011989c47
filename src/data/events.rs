use crate::shared::*;

/// A season-locked price event. Active while the season clock sits inside
/// `[start, end)`, expressed as fractions of the season length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeasonalEpic {
    pub name: &'static str,
    pub season: Season,
    pub start: f32,
    pub end: f32,
    pub crops: &'static [CropKind],
}

pub const SEASONAL_EPICS: [SeasonalEpic; 4] = [
    SeasonalEpic {
        name: "Spring Fair",
        season: Season::Spring,
        start: 0.25,
        end: 0.5,
        crops: &[CropKind::Strawberry, CropKind::Carrot],
    },
    SeasonalEpic {
        name: "Summer Barbecue",
        season: Season::Summer,
        start: 0.5,
        end: 0.75,
        crops: &[CropKind::Corn, CropKind::Tomato],
    },
    SeasonalEpic {
        name: "Harvest Festival",
        season: Season::Fall,
        start: 0.6,
        end: 0.9,
        crops: &[CropKind::Pumpkin, CropKind::Potato],
    },
    SeasonalEpic {
        name: "Winter Feast",
        season: Season::Winter,
        start: 0.3,
        end: 0.6,
        crops: &[CropKind::Potato, CropKind::Wheat],
    },
];

/// The seasonal epic running at `progress` (0..1) through `season`, if any.
pub fn seasonal_epic_at(season: Season, progress: f32) -> Option<&'static SeasonalEpic> {
    SEASONAL_EPICS
        .iter()
        .find(|e| e.season == season && progress >= e.start && progress < e.end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_bounds() {
        assert!(seasonal_epic_at(Season::Summer, 0.49).is_none());
        assert_eq!(
            seasonal_epic_at(Season::Summer, 0.5).map(|e| e.name),
            Some("Summer Barbecue")
        );
        assert!(seasonal_epic_at(Season::Summer, 0.75).is_none());
    }
}

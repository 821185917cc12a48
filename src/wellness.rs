// 🌿 Wellness tips & citations - static guidance per category

use serde::Serialize;

pub const SAFETY_NOTE: &str = "This chatbot provides general wellness information and is not a \
substitute for professional medical advice. If you have severe, persistent, or worrying symptoms, \
please seek a qualified clinician.";

/// Tip returned for categories without curated content
pub const GENERIC_TIP: &str = "Stay curious, stay kind to your body!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Citation {
    pub label: &'static str,
    pub url: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Hydration,
    Sleep,
    Nutrition,
    Stress,
}

impl Category {
    pub fn parse(value: &str) -> Option<Category> {
        match value.trim().to_lowercase().as_str() {
            "hydration" => Some(Category::Hydration),
            "sleep" => Some(Category::Sleep),
            "nutrition" => Some(Category::Nutrition),
            "stress" => Some(Category::Stress),
            _ => None,
        }
    }

    pub fn tips(&self) -> &'static [&'static str] {
        match self {
            Category::Hydration => &[
                "Carry a reusable bottle and set hourly reminders to sip.",
                "Flavor water with lemon or mint instead of sugary drinks.",
            ],
            Category::Sleep => &[
                "Aim for 7–9 hours. Keep a regular sleep/wake schedule, even on weekends.",
                "Avoid screens 60 minutes before bed; dim lights to cue melatonin.",
            ],
            Category::Nutrition => &[
                "Build plates with 1/2 veggies, 1/4 protein, 1/4 whole grains.",
                "Add a fruit or nuts for a fiber-rich snack to steady energy.",
            ],
            Category::Stress => &[
                "Try a 4-7-8 breathing cycle for 1 minute during stressful moments.",
                "Schedule a 10-minute walk to reset your nervous system.",
            ],
        }
    }

    pub fn citations(&self) -> &'static [Citation] {
        match self {
            Category::Hydration => &[
                Citation {
                    label: "WHO – Healthy Hydration",
                    url: "https://www.who.int/",
                },
                Citation {
                    label: "CDC – Water & Nutrition",
                    url: "https://www.cdc.gov/healthyweight/healthy_eating/water-and-health.html",
                },
            ],
            Category::Sleep => &[Citation {
                label: "NIH – Healthy Sleep",
                url: "https://www.nhlbi.nih.gov/health/sleep",
            }],
            Category::Nutrition => &[Citation {
                label: "Harvard – Healthy Plate",
                url: "https://www.hsph.harvard.edu/nutritionsource/healthy-eating-plate/",
            }],
            Category::Stress => &[Citation {
                label: "WHO – Stress Management",
                url: "https://www.who.int/",
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WellnessTip {
    pub category: String,
    pub tip: &'static str,
    pub citations: Vec<Citation>,
    pub safety_note: &'static str,
}

/// Tip for `category`, rotating through its list by `rotation`
/// (the server passes the day of the year).
pub fn tip_for(category: &str, rotation: usize) -> WellnessTip {
    match Category::parse(category) {
        Some(known) => {
            let tips = known.tips();
            WellnessTip {
                category: category.trim().to_lowercase(),
                tip: tips[rotation % tips.len()],
                citations: known.citations().to_vec(),
                safety_note: SAFETY_NOTE,
            }
        }
        None => WellnessTip {
            category: category.trim().to_lowercase(),
            tip: GENERIC_TIP,
            citations: Vec::new(),
            safety_note: SAFETY_NOTE,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_category_rotates() {
        let first = tip_for("Sleep", 0);
        let second = tip_for("sleep", 1);
        let wrapped = tip_for("sleep", 2);

        assert_eq!(first.category, "sleep");
        assert_ne!(first.tip, second.tip);
        assert_eq!(first.tip, wrapped.tip);
        assert_eq!(first.citations.len(), 1);
    }

    #[test]
    fn test_unknown_category_gets_generic_tip() {
        let tip = tip_for("astrology", 3);

        assert_eq!(tip.tip, GENERIC_TIP);
        assert!(tip.citations.is_empty());
        assert_eq!(tip.safety_note, SAFETY_NOTE);
    }

    #[test]
    fn test_every_category_has_tips_and_citations() {
        for category in [
            Category::Hydration,
            Category::Sleep,
            Category::Nutrition,
            Category::Stress,
        ] {
            assert!(!category.tips().is_empty());
            assert!(!category.citations().is_empty());
        }
    }
}

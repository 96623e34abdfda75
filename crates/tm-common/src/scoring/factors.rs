use crate::normalize::{normalize_place, normalize_skill_set};

/// Grace band around an experience requirement, in years.
pub const EXPERIENCE_BUFFER_YEARS: f64 = 1.0;

const NEUTRAL_SCORE: f64 = 0.5;

/// Share of the target's skill requirements covered by the entity, after
/// alias normalization. A target without requirements scores neutral: we
/// cannot tell a perfect fit from an unknown one.
pub fn skills_overlap(entity_skills: &[String], target_skills: &[String]) -> f64 {
    let required = normalize_skill_set(target_skills);
    if required.is_empty() {
        return NEUTRAL_SCORE;
    }

    let possessed = normalize_skill_set(entity_skills);
    required.intersection(&possessed).count() as f64 / required.len() as f64
}

/// Tiered proximity of the entity's years of experience to the target's
/// requirement. No requirement passes outright; an unknown entity value
/// scores neutral rather than failing the candidate.
pub fn experience_proximity(entity_years: Option<f64>, required_years: Option<f64>) -> f64 {
    let Some(required) = required_years else {
        return 1.0;
    };
    let Some(actual) = entity_years else {
        return NEUTRAL_SCORE;
    };

    if actual >= required + 2.0 * EXPERIENCE_BUFFER_YEARS {
        1.0
    } else if actual >= required {
        0.8
    } else if actual + EXPERIENCE_BUFFER_YEARS >= required {
        0.4
    } else {
        0.0
    }
}

fn education_rank(level: &str) -> Option<u8> {
    match normalize_place(level).as_str() {
        "high school" | "highschool" | "secondary" => Some(1),
        "associate" | "diploma" | "vocational" => Some(2),
        "bachelor" | "bachelors" | "undergraduate" | "bs" | "ba" => Some(3),
        "master" | "masters" | "ms" | "ma" | "mba" => Some(4),
        "doctorate" | "doctoral" | "phd" => Some(5),
        _ => None,
    }
}

/// Ordinal education match. Meeting or exceeding the required level is a
/// full match; each missing level halves the score down to zero.
pub fn education_match(entity_level: Option<&str>, required_level: Option<&str>) -> f64 {
    let Some(required) = required_level else {
        return 1.0;
    };
    let Some(required_rank) = education_rank(required) else {
        return NEUTRAL_SCORE;
    };
    let Some(entity_rank) = entity_level.and_then(education_rank) else {
        return NEUTRAL_SCORE;
    };

    match required_rank.saturating_sub(entity_rank) {
        0 => 1.0,
        1 => 0.5,
        2 => 0.25,
        _ => 0.0,
    }
}

/// Location match on the folded strings: same place is a full match, same
/// region a partial one, two known-but-different places a miss. Anything
/// unknown on either side scores neutral.
pub fn location_match(
    entity_location: Option<&str>,
    entity_region: Option<&str>,
    target_location: Option<&str>,
    target_region: Option<&str>,
) -> f64 {
    let fold = |value: Option<&str>| {
        value
            .map(normalize_place)
            .filter(|folded| !folded.is_empty())
    };

    let entity_place = fold(entity_location);
    let target_place = fold(target_location);

    if let (Some(a), Some(b)) = (&entity_place, &target_place) {
        if a == b {
            return 1.0;
        }
    }

    if let (Some(a), Some(b)) = (fold(entity_region), fold(target_region)) {
        if a == b {
            return 0.7;
        }
    }

    if entity_place.is_some() && target_place.is_some() {
        return 0.0;
    }

    NEUTRAL_SCORE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn skills_overlap_is_a_coverage_ratio() {
        let target = strings(&["rust", "postgres", "docker", "aws", "react"]);
        let entity = strings(&["Rust", "PostgreSQL", "Docker", "AWS", "vue"]);

        let score = skills_overlap(&entity, &target);

        assert!((score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn skills_overlap_without_requirements_is_neutral() {
        assert_eq!(skills_overlap(&strings(&["rust"]), &[]), 0.5);
    }

    #[test]
    fn experience_tiers_cover_the_requirement_band() {
        assert_eq!(experience_proximity(Some(8.0), Some(5.0)), 1.0);
        assert_eq!(experience_proximity(Some(5.5), Some(5.0)), 0.8);
        assert_eq!(experience_proximity(Some(4.0), Some(5.0)), 0.4);
        assert_eq!(experience_proximity(Some(2.0), Some(5.0)), 0.0);
    }

    #[test]
    fn experience_without_requirement_passes() {
        assert_eq!(experience_proximity(None, None), 1.0);
        assert_eq!(experience_proximity(Some(1.0), None), 1.0);
    }

    #[test]
    fn unknown_experience_scores_neutral() {
        assert_eq!(experience_proximity(None, Some(3.0)), 0.5);
    }

    #[test]
    fn education_meets_or_exceeds_requirement() {
        assert_eq!(education_match(Some("Master"), Some("bachelor")), 1.0);
        assert_eq!(education_match(Some("PhD"), Some("doctorate")), 1.0);
    }

    #[test]
    fn education_deficit_halves_per_level() {
        assert_eq!(education_match(Some("bachelor"), Some("master")), 0.5);
        assert_eq!(education_match(Some("associate"), Some("master")), 0.25);
        assert_eq!(education_match(Some("high school"), Some("doctorate")), 0.0);
    }

    #[test]
    fn unknown_education_is_neutral() {
        assert_eq!(education_match(None, Some("bachelor")), 0.5);
        assert_eq!(education_match(Some("apprentice"), Some("bachelor")), 0.5);
        assert_eq!(education_match(None, None), 1.0);
    }

    #[test]
    fn location_exact_match_wins() {
        assert_eq!(
            location_match(Some("Berlin"), Some("EU"), Some("berlin"), Some("EU")),
            1.0
        );
    }

    #[test]
    fn location_same_region_is_partial() {
        assert_eq!(
            location_match(Some("Hamburg"), Some("EU"), Some("Berlin"), Some("eu")),
            0.7
        );
        assert_eq!(location_match(None, Some("EU"), None, Some("EU")), 0.7);
    }

    #[test]
    fn location_known_but_different_is_a_miss() {
        assert_eq!(
            location_match(Some("Tokyo"), Some("APAC"), Some("Berlin"), Some("EU")),
            0.0
        );
        assert_eq!(location_match(Some("Tokyo"), None, Some("Berlin"), None), 0.0);
    }

    #[test]
    fn location_unknown_side_is_neutral() {
        assert_eq!(location_match(None, None, Some("Berlin"), Some("EU")), 0.5);
        assert_eq!(location_match(Some("Berlin"), None, None, None), 0.5);
    }
}

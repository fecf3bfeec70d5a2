//! Preference scores from family ratings.
//!
//! A recipe's score is the weighted mean of its ratings, pulled toward a
//! neutral prior:
//!
//! ```text
//! score = (Σ w·d(age)·s + p·prior) / (Σ w·d(age) + p)
//! ```
//!
//! `w` is the rater's preference weight, `d` the recency decay and `p` the
//! prior strength. An unrated recipe scores exactly the prior, and old
//! ratings fade back toward it instead of pinning a recipe at an extreme.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use larder_db::models::{FamilyMember, Rating, RaterClass};

use crate::error::{LarderError, Result};

/// How much a rating counts as it ages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecencyDecay {
    /// Every rating counts fully regardless of age.
    None,
    /// Weight halves every `half_life_days`.
    Exponential { half_life_days: f64 },
    /// Full weight up to `max_age_days`, nothing after.
    Cutoff { max_age_days: i64 },
}

impl Default for RecencyDecay {
    fn default() -> Self {
        Self::Exponential {
            half_life_days: 90.0,
        }
    }
}

impl RecencyDecay {
    /// Decay factor in `[0, 1]` for a rating `age_days` old. Ratings dated
    /// in the future count as fresh.
    pub fn factor(&self, age_days: f64) -> f64 {
        let age = age_days.max(0.0);
        match *self {
            Self::None => 1.0,
            Self::Exponential { half_life_days } => 0.5_f64.powf(age / half_life_days),
            Self::Cutoff { max_age_days } => {
                if age <= max_age_days as f64 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Tuning knobs of the preference model (`[preferences]` in the catalog).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceConfig {
    /// Score of a recipe nobody has rated.
    pub neutral_prior: f64,
    /// Weight of the prior, in rating-equivalents.
    pub prior_strength: f64,
    pub decay: RecencyDecay,
    /// Weight used for a kid's rating when the member record is gone.
    pub kid_weight: f64,
    /// Weight used for an adult's rating when the member record is gone.
    pub adult_weight: f64,
}

impl Default for PreferenceConfig {
    fn default() -> Self {
        Self {
            neutral_prior: 3.0,
            prior_strength: 1.0,
            decay: RecencyDecay::default(),
            kid_weight: 1.5,
            adult_weight: 1.0,
        }
    }
}

impl PreferenceConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1.0..=5.0).contains(&self.neutral_prior) {
            return Err(LarderError::validation(format!(
                "neutral_prior must be between 1 and 5, got {}",
                self.neutral_prior
            )));
        }
        if !(self.prior_strength > 0.0) {
            return Err(LarderError::validation("prior_strength must be positive"));
        }
        if !(self.kid_weight > 0.0 && self.adult_weight > 0.0) {
            return Err(LarderError::validation("rater weights must be positive"));
        }
        match self.decay {
            RecencyDecay::Exponential { half_life_days } if !(half_life_days > 0.0) => Err(
                LarderError::validation("decay half_life_days must be positive"),
            ),
            RecencyDecay::Cutoff { max_age_days } if max_age_days < 0 => Err(
                LarderError::validation("decay max_age_days must not be negative"),
            ),
            _ => Ok(()),
        }
    }

    fn class_weight(&self, class: RaterClass) -> f64 {
        match class {
            RaterClass::Kid => self.kid_weight,
            RaterClass::Adult => self.adult_weight,
        }
    }
}

/// Aggregated preference for one recipe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecipeScore {
    pub score: f64,
    /// Number of ratings considered, regardless of decay.
    pub rating_count: usize,
    /// Total decayed weight the ratings contributed.
    pub effective_weight: f64,
}

/// Score every recipe in `recipe_ids` from `ratings` as of `now`.
///
/// Ratings of recipes outside `recipe_ids` are ignored. Each recipe is
/// scored independently of the others.
pub fn score_recipes(
    recipe_ids: &[Uuid],
    ratings: &[Rating],
    members: &[FamilyMember],
    config: &PreferenceConfig,
    now: DateTime<Utc>,
) -> HashMap<Uuid, RecipeScore> {
    let weights: HashMap<Uuid, f64> = members
        .iter()
        .map(|m| (m.id, m.preference_weight))
        .collect();

    let mut sums: HashMap<Uuid, (f64, f64, usize)> =
        recipe_ids.iter().map(|id| (*id, (0.0, 0.0, 0))).collect();

    for rating in ratings {
        let Some(entry) = sums.get_mut(&rating.recipe_id) else {
            continue;
        };
        let weight = weights
            .get(&rating.member_id)
            .copied()
            .unwrap_or_else(|| config.class_weight(rating.rater_class));
        let age_days = (now - rating.created_at).num_seconds() as f64 / 86_400.0;
        let w = weight * config.decay.factor(age_days);
        entry.0 += w * f64::from(rating.score);
        entry.1 += w;
        entry.2 += 1;
    }

    sums.into_iter()
        .map(|(id, (weighted, total, count))| {
            let score = (weighted + config.prior_strength * config.neutral_prior)
                / (total + config.prior_strength);
            (
                id,
                RecipeScore {
                    score,
                    rating_count: count,
                    effective_weight: total,
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use larder_db::models::{KidReaction, MemberRole};

    use super::*;

    fn member(role: MemberRole, weight: f64) -> FamilyMember {
        FamilyMember {
            id: Uuid::new_v4(),
            family_id: Uuid::nil(),
            display_name: format!("{role}"),
            role,
            preference_weight: weight,
            chat_user_id: None,
            created_at: Utc::now(),
        }
    }

    fn rating(recipe: Uuid, member: &FamilyMember, score: i16, at: DateTime<Utc>) -> Rating {
        Rating {
            id: Uuid::new_v4(),
            recipe_id: recipe,
            member_id: member.id,
            rater_class: member.role.rater_class(),
            score,
            kid_reaction: None,
            feedback: None,
            created_at: at,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn unrated_recipe_scores_prior() {
        let recipe = Uuid::new_v4();
        let scores = score_recipes(&[recipe], &[], &[], &PreferenceConfig::default(), Utc::now());
        assert!(approx(scores[&recipe].score, 3.0));
        assert_eq!(scores[&recipe].rating_count, 0);
    }

    #[test]
    fn weighted_mean_with_prior() {
        let now = Utc::now();
        let recipe = Uuid::new_v4();
        let parent = member(MemberRole::Parent, 1.0);
        let kid = member(MemberRole::Kid, 1.5);
        let ratings = vec![
            rating(recipe, &parent, 4, now),
            rating(recipe, &kid, KidReaction::Yummy.score(), now),
        ];
        let config = PreferenceConfig {
            decay: RecencyDecay::None,
            ..PreferenceConfig::default()
        };
        let scores = score_recipes(&[recipe], &ratings, &[parent, kid], &config, now);
        // (1*4 + 1.5*5 + 1*3) / (1 + 1.5 + 1)
        assert!(approx(scores[&recipe].score, 14.5 / 3.5));
        assert_eq!(scores[&recipe].rating_count, 2);
    }

    #[test]
    fn missing_member_falls_back_to_class_weight() {
        let now = Utc::now();
        let recipe = Uuid::new_v4();
        let kid = member(MemberRole::Kid, 9.0);
        let ratings = vec![rating(recipe, &kid, 1, now)];
        let config = PreferenceConfig {
            decay: RecencyDecay::None,
            ..PreferenceConfig::default()
        };
        let scores = score_recipes(&[recipe], &ratings, &[], &config, now);
        // (1.5*1 + 3) / (1.5 + 1)
        assert!(approx(scores[&recipe].score, 4.5 / 2.5));
    }

    #[test]
    fn exponential_decay_halves_weight() {
        let decay = RecencyDecay::Exponential {
            half_life_days: 90.0,
        };
        assert!(approx(decay.factor(0.0), 1.0));
        assert!(approx(decay.factor(90.0), 0.5));
        assert!(approx(decay.factor(-5.0), 1.0));
    }

    #[test]
    fn cutoff_drops_old_ratings_back_to_prior() {
        let now = Utc::now();
        let recipe = Uuid::new_v4();
        let parent = member(MemberRole::Parent, 1.0);
        let ratings = vec![rating(recipe, &parent, 1, now - Duration::days(400))];
        let config = PreferenceConfig {
            decay: RecencyDecay::Cutoff { max_age_days: 365 },
            ..PreferenceConfig::default()
        };
        let scores = score_recipes(&[recipe], &ratings, &[parent], &config, now);
        assert!(approx(scores[&recipe].score, 3.0));
        assert_eq!(scores[&recipe].rating_count, 1);
        assert!(approx(scores[&recipe].effective_weight, 0.0));
    }

    #[test]
    fn old_ratings_count_less_than_new_ones() {
        let now = Utc::now();
        let recipe = Uuid::new_v4();
        let parent = member(MemberRole::Parent, 1.0);
        let ratings = vec![
            rating(recipe, &parent, 1, now - Duration::days(180)),
            rating(recipe, &parent, 5, now),
        ];
        let scores = score_recipes(
            &[recipe],
            &ratings,
            &[parent],
            &PreferenceConfig::default(),
            now,
        );
        // Old 1 at quarter weight, new 5 at full weight.
        assert!(approx(scores[&recipe].score, (0.25 + 5.0 + 3.0) / 2.25));
    }

    #[test]
    fn ratings_of_other_recipes_are_ignored() {
        let now = Utc::now();
        let recipe = Uuid::new_v4();
        let parent = member(MemberRole::Parent, 1.0);
        let ratings = vec![rating(Uuid::new_v4(), &parent, 5, now)];
        let scores = score_recipes(&[recipe], &ratings, &[parent], &PreferenceConfig::default(), now);
        assert_eq!(scores.len(), 1);
        assert!(approx(scores[&recipe].score, 3.0));
    }

    #[test]
    fn config_validation() {
        assert!(PreferenceConfig::default().validate().is_ok());
        let bad = PreferenceConfig {
            prior_strength: 0.0,
            ..PreferenceConfig::default()
        };
        assert!(bad.validate().is_err());
        let bad = PreferenceConfig {
            decay: RecencyDecay::Exponential {
                half_life_days: 0.0,
            },
            ..PreferenceConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn decay_parses_from_toml() {
        let config: PreferenceConfig = toml::from_str(
            r#"
neutral_prior = 2.5
decay = { kind = "cutoff", max_age_days = 180 }
"#,
        )
        .unwrap();
        assert!(approx(config.neutral_prior, 2.5));
        assert_eq!(config.decay, RecencyDecay::Cutoff { max_age_days: 180 });
        assert!(approx(config.prior_strength, 1.0));
    }
}

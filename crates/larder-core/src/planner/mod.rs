//! Weekly plan generation.
//!
//! The generator is a pure function of its inputs: candidate recipes,
//! preference scores, serving history and the seasonal produce hint set.
//! [`service`] wraps it with storage, the generation lease and the
//! approval rules.
//!
//! Selection is greedy, one day at a time. Each day takes the best-ranked
//! candidate from the strictest tier that has one:
//!
//! 1. not served inside the repeat window and not yet used this week;
//! 2. not yet used this week (repeat window relaxed);
//! 3. anything eligible (diversity relaxed as well).
//!
//! Ties are broken by fewest recent uses, then by recipe id, so the same
//! inputs always produce the same plan.

pub mod service;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use larder_db::models::{MealPlan, PlannedDay, Recipe, Relaxation};

use crate::error::{LarderError, Result};
use crate::preference::RecipeScore;
use crate::seasonal::matches_produce;
use crate::week::IsoWeek;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Minimum variety a week should reach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthTarget {
    pub min_distinct_proteins: usize,
    pub min_vegetable_days: usize,
}

impl Default for HealthTarget {
    fn default() -> Self {
        Self {
            min_distinct_proteins: 3,
            min_vegetable_days: 4,
        }
    }
}

/// Bonuses and penalties added to a recipe's preference score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
    pub seasonal_per_match: f64,
    pub seasonal_cap: f64,
    pub favorite_bonus: f64,
    pub new_protein_bonus: f64,
    pub repeat_protein_penalty: f64,
    pub vegetable_bonus: f64,
    pub repeat_recipe_penalty: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            seasonal_per_match: 0.3,
            seasonal_cap: 1.0,
            favorite_bonus: 0.5,
            new_protein_bonus: 0.75,
            repeat_protein_penalty: 0.5,
            vegetable_bonus: 0.5,
            repeat_recipe_penalty: 2.0,
        }
    }
}

/// Planner settings (`[planner]` in the catalog).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Days to plan, e.g. `["Mon", "Tue", "Wed"]`.
    pub days: Vec<Weekday>,
    /// Weeks a served recipe sits out before the strict pass admits it.
    pub repeat_window_weeks: u32,
    /// Weeks of history counted for the recent-use tie-break.
    pub history_weeks: u32,
    pub health: HealthTarget,
    pub weights: RankingWeights,
    /// Ingredient categories that make a recipe count as a vegetable day.
    pub vegetable_categories: Vec<String>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Sat,
                Weekday::Sun,
            ],
            repeat_window_weeks: 2,
            history_weeks: 8,
            health: HealthTarget::default(),
            weights: RankingWeights::default(),
            vegetable_categories: vec!["produce".into()],
        }
    }
}

impl PlannerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.days.is_empty() {
            return Err(LarderError::validation("planner days must not be empty"));
        }
        let unique: HashSet<_> = self.days.iter().collect();
        if unique.len() != self.days.len() {
            return Err(LarderError::validation("planner days contain duplicates"));
        }
        if self.history_weeks < self.repeat_window_weeks {
            return Err(LarderError::validation(
                "history_weeks must be at least repeat_window_weeks",
            ));
        }
        Ok(())
    }

    /// Configured days in calendar order.
    pub fn ordered_days(&self) -> Vec<Weekday> {
        let mut days = self.days.clone();
        days.sort_by_key(|d| d.num_days_from_monday());
        days.dedup();
        days
    }

    fn is_vegetable(&self, recipe: &Recipe) -> bool {
        recipe.ingredients.iter().any(|i| {
            let category = i.category.trim().to_lowercase();
            self.vegetable_categories
                .iter()
                .any(|v| v.eq_ignore_ascii_case(&category))
        })
    }
}

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// How a recipe figures in the family's serving history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageStats {
    /// Served in a plan inside the repeat window.
    pub in_window: bool,
    /// Days served across the history window.
    pub recent_uses: u32,
}

/// Usage statistics from the current approved plans of earlier weeks.
pub fn usage_from_history(
    history: &[MealPlan],
    week: IsoWeek,
    config: &PlannerConfig,
) -> HashMap<Uuid, UsageStats> {
    let start = week.monday();
    let window_start = week.weeks_before(config.repeat_window_weeks).monday();
    let history_start = week.weeks_before(config.history_weeks).monday();

    let mut usage: HashMap<Uuid, UsageStats> = HashMap::new();
    for plan in history
        .iter()
        .filter(|p| p.is_current_approved() && p.week_start < start)
    {
        let in_window = plan.week_start >= window_start;
        let counted = plan.week_start >= history_start;
        for day in plan.days.iter() {
            let stats = usage.entry(day.recipe_id).or_default();
            stats.in_window |= in_window;
            if counted {
                stats.recent_uses += 1;
            }
        }
    }
    usage
}

/// Everything the generator needs for one week.
#[derive(Debug, Clone, Copy)]
pub struct PlanContext<'a> {
    pub week: IsoWeek,
    pub recipes: &'a [Recipe],
    pub scores: &'a HashMap<Uuid, RecipeScore>,
    pub usage: &'a HashMap<Uuid, UsageStats>,
    /// Lowercased peak-produce names for the week.
    pub peak_produce: &'a [String],
    /// Score of a recipe missing from `scores`.
    pub neutral_prior: f64,
    pub config: &'a PlannerConfig,
}

/// How far the week got toward its health target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub distinct_proteins: usize,
    pub vegetable_days: usize,
    pub proteins_met: bool,
    pub vegetables_met: bool,
}

/// A generated week.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOutcome {
    pub days: Vec<PlannedDay>,
    /// Days filled only by relaxing a constraint.
    pub relaxed_days: Vec<Weekday>,
    pub health: HealthReport,
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

struct Candidate<'a> {
    recipe: &'a Recipe,
    base: f64,
    protein: Option<String>,
    vegetable: bool,
    in_window: bool,
    recent_uses: u32,
}

#[derive(Default)]
struct WeekState {
    protein_uses: HashMap<String, u32>,
    recipe_uses: HashMap<Uuid, u32>,
    vegetable_days: usize,
}

impl WeekState {
    fn record(&mut self, candidate: &Candidate<'_>) {
        if let Some(protein) = &candidate.protein {
            *self.protein_uses.entry(protein.clone()).or_default() += 1;
        }
        *self.recipe_uses.entry(candidate.recipe.id).or_default() += 1;
        if candidate.vegetable {
            self.vegetable_days += 1;
        }
    }

    fn uses_of(&self, id: Uuid) -> u32 {
        self.recipe_uses.get(&id).copied().unwrap_or(0)
    }

    fn health(&self, target: &HealthTarget) -> HealthReport {
        let distinct_proteins = self.protein_uses.len();
        HealthReport {
            distinct_proteins,
            vegetable_days: self.vegetable_days,
            proteins_met: distinct_proteins >= target.min_distinct_proteins,
            vegetables_met: self.vegetable_days >= target.min_vegetable_days,
        }
    }
}

fn normalized_protein(recipe: &Recipe) -> Option<String> {
    recipe
        .protein
        .as_deref()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
}

/// Bonus for ingredients at their seasonal peak.
fn seasonal_bonus(recipe: &Recipe, peak_produce: &[String], weights: &RankingWeights) -> f64 {
    let matches = recipe
        .ingredients
        .iter()
        .filter(|i| peak_produce.iter().any(|p| matches_produce(&i.name, p)))
        .count();
    (matches as f64 * weights.seasonal_per_match).min(weights.seasonal_cap)
}

fn candidates<'a>(ctx: &PlanContext<'a>) -> Vec<Candidate<'a>> {
    let weights = &ctx.config.weights;
    ctx.recipes
        .iter()
        .filter(|r| r.is_plannable())
        .map(|recipe| {
            let preference = ctx
                .scores
                .get(&recipe.id)
                .map(|s| s.score)
                .unwrap_or(ctx.neutral_prior);
            let favorite = if recipe.favorite {
                weights.favorite_bonus
            } else {
                0.0
            };
            let usage = ctx.usage.get(&recipe.id).copied().unwrap_or_default();
            Candidate {
                recipe,
                base: preference + seasonal_bonus(recipe, ctx.peak_produce, weights) + favorite,
                protein: normalized_protein(recipe),
                vegetable: ctx.config.is_vegetable(recipe),
                in_window: usage.in_window,
                recent_uses: usage.recent_uses,
            }
        })
        .collect()
}

fn diversity_adjustment(candidate: &Candidate<'_>, state: &WeekState, config: &PlannerConfig) -> f64 {
    let weights = &config.weights;
    let target = &config.health;
    let mut adjustment = 0.0;

    if let Some(protein) = &candidate.protein {
        match state.protein_uses.get(protein).copied().unwrap_or(0) {
            0 if state.protein_uses.len() < target.min_distinct_proteins => {
                adjustment += weights.new_protein_bonus;
            }
            0 => {}
            uses => adjustment -= weights.repeat_protein_penalty * f64::from(uses),
        }
    }
    if candidate.vegetable && state.vegetable_days < target.min_vegetable_days {
        adjustment += weights.vegetable_bonus;
    }
    adjustment - weights.repeat_recipe_penalty * f64::from(state.uses_of(candidate.recipe.id))
}

/// Pick the best candidate for the next day along with the relaxations
/// that admitting it required.
fn pick<'c, 'a>(
    candidates: &'c [Candidate<'a>],
    state: &WeekState,
    config: &PlannerConfig,
) -> Option<(&'c Candidate<'a>, Vec<Relaxation>)> {
    const TIERS: [(bool, bool); 3] = [(false, false), (true, false), (true, true)];

    for (allow_window, allow_repeat) in TIERS {
        let best = candidates
            .iter()
            .filter(|c| allow_window || !c.in_window)
            .filter(|c| allow_repeat || state.uses_of(c.recipe.id) == 0)
            .map(|c| (c.base + diversity_adjustment(c, state, config), c))
            .min_by(|(sa, a), (sb, b)| {
                sb.total_cmp(sa)
                    .then(a.recent_uses.cmp(&b.recent_uses))
                    .then(a.recipe.id.cmp(&b.recipe.id))
            });

        if let Some((_, chosen)) = best {
            let mut relaxed = Vec::new();
            if chosen.in_window {
                relaxed.push(Relaxation::RepeatWindow);
            }
            if state.uses_of(chosen.recipe.id) > 0 {
                relaxed.push(Relaxation::Diversity);
            }
            return Some((chosen, relaxed));
        }
    }
    None
}

fn planned_day(week: IsoWeek, weekday: Weekday, recipe: &Recipe, relaxed: Vec<Relaxation>) -> PlannedDay {
    PlannedDay {
        weekday,
        date: week.date_of(weekday),
        recipe_id: recipe.id,
        recipe_title: recipe.title.clone(),
        relaxed,
    }
}

fn insufficient(week: IsoWeek) -> LarderError {
    LarderError::InsufficientData {
        key: week.to_string(),
        message: "no approved, unarchived recipes to plan with".into(),
    }
}

/// Generate a plan for every configured day of the week.
///
/// Fails with [`LarderError::InsufficientData`] only when no recipe is
/// eligible; any shortage beyond that is covered by relaxation.
pub fn generate(ctx: &PlanContext<'_>) -> Result<PlanOutcome> {
    ctx.config.validate()?;
    let candidates = candidates(ctx);
    if candidates.is_empty() {
        return Err(insufficient(ctx.week));
    }

    let mut state = WeekState::default();
    let mut days = Vec::new();
    let mut relaxed_days = Vec::new();

    for weekday in ctx.config.ordered_days() {
        let (chosen, relaxed) = pick(&candidates, &state, ctx.config)
            .ok_or_else(|| insufficient(ctx.week))?;
        if !relaxed.is_empty() {
            relaxed_days.push(weekday);
        }
        state.record(chosen);
        days.push(planned_day(ctx.week, weekday, chosen.recipe, relaxed));
    }

    let health = state.health(&ctx.config.health);
    if !relaxed_days.is_empty() {
        tracing::warn!(
            week = %ctx.week,
            relaxed = relaxed_days.len(),
            eligible = candidates.len(),
            "not enough recipes for a strict plan, constraints relaxed"
        );
    }
    if !(health.proteins_met && health.vegetables_met) {
        tracing::info!(
            week = %ctx.week,
            distinct_proteins = health.distinct_proteins,
            vegetable_days = health.vegetable_days,
            "health target not met"
        );
    }

    Ok(PlanOutcome {
        days,
        relaxed_days,
        health,
    })
}

/// Choose a new recipe for one day of an existing plan, keeping the other
/// days. The recipe currently on that day is only chosen again when nothing
/// else is eligible.
pub fn reselect_day(
    ctx: &PlanContext<'_>,
    current: &[PlannedDay],
    weekday: Weekday,
) -> Result<PlannedDay> {
    let Some(replaced) = current.iter().find(|d| d.weekday == weekday) else {
        return Err(LarderError::validation(format!(
            "plan for {} has no {weekday}",
            ctx.week
        )));
    };

    let candidates = candidates(ctx);
    if candidates.is_empty() {
        return Err(insufficient(ctx.week));
    }

    let by_id: HashMap<Uuid, &Candidate<'_>> =
        candidates.iter().map(|c| (c.recipe.id, c)).collect();
    let mut state = WeekState::default();
    for day in current.iter().filter(|d| d.weekday != weekday) {
        match by_id.get(&day.recipe_id) {
            Some(c) => state.record(c),
            None => *state.recipe_uses.entry(day.recipe_id).or_default() += 1,
        }
    }
    *state.recipe_uses.entry(replaced.recipe_id).or_default() += 1;

    let (chosen, mut relaxed) =
        pick(&candidates, &state, ctx.config).ok_or_else(|| insufficient(ctx.week))?;
    // Re-picking the same recipe is not a second use within the week.
    if chosen.recipe.id == replaced.recipe_id
        && !current
            .iter()
            .any(|d| d.weekday != weekday && d.recipe_id == chosen.recipe.id)
    {
        relaxed.retain(|r| *r != Relaxation::Diversity);
    }
    Ok(planned_day(ctx.week, weekday, chosen.recipe, relaxed))
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Digest of a plan for display and notifications.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanSummary {
    pub week: String,
    pub days: Vec<(Weekday, NaiveDate, String)>,
    pub distinct_proteins: Vec<String>,
    pub vegetable_days: usize,
    /// Peak produce the plan's recipes use.
    pub seasonal_items: Vec<String>,
    pub relaxed_days: Vec<Weekday>,
}

/// Summarize `days`. Recipes missing from `recipes` still list by title but
/// contribute nothing to the protein, vegetable and seasonal counts.
pub fn summarize(
    week: &str,
    days: &[PlannedDay],
    recipes: &[Recipe],
    peak_produce: &[String],
    config: &PlannerConfig,
) -> PlanSummary {
    let by_id: HashMap<Uuid, &Recipe> = recipes.iter().map(|r| (r.id, r)).collect();
    let mut proteins = BTreeSet::new();
    let mut seasonal = BTreeSet::new();
    let mut vegetable_days = 0;

    for day in days {
        let Some(recipe) = by_id.get(&day.recipe_id) else {
            continue;
        };
        if let Some(protein) = normalized_protein(recipe) {
            proteins.insert(protein);
        }
        if config.is_vegetable(recipe) {
            vegetable_days += 1;
        }
        for produce in peak_produce {
            if recipe.ingredients.iter().any(|i| matches_produce(&i.name, produce)) {
                seasonal.insert(produce.clone());
            }
        }
    }

    PlanSummary {
        week: week.to_owned(),
        days: days
            .iter()
            .map(|d| (d.weekday, d.date, d.recipe_title.clone()))
            .collect(),
        distinct_proteins: proteins.into_iter().collect(),
        vegetable_days,
        seasonal_items: seasonal.into_iter().collect(),
        relaxed_days: days
            .iter()
            .filter(|d| !d.relaxed.is_empty())
            .map(|d| d.weekday)
            .collect(),
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Meal plan for {}", self.week)?;
        for (weekday, date, title) in &self.days {
            let marker = if self.relaxed_days.contains(weekday) {
                " *"
            } else {
                ""
            };
            writeln!(f, "  {weekday} {}: {title}{marker}", date.format("%b %d"))?;
        }
        if !self.distinct_proteins.is_empty() {
            writeln!(f, "Proteins: {}", self.distinct_proteins.join(", "))?;
        }
        writeln!(f, "Vegetable days: {}", self.vegetable_days)?;
        if !self.seasonal_items.is_empty() {
            writeln!(f, "In season: {}", self.seasonal_items.join(", "))?;
        }
        if !self.relaxed_days.is_empty() {
            writeln!(f, "* repeats a recent or already-planned recipe")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use larder_db::models::{ApprovalStatus, Ingredient, MemberRole};
    use sqlx::types::Json;

    use super::*;

    fn recipe(n: u128, title: &str, protein: Option<&str>, ingredients: &[(&str, &str)]) -> Recipe {
        Recipe {
            id: Uuid::from_u128(n),
            family_id: Uuid::nil(),
            title: title.into(),
            ingredients: Json(
                ingredients
                    .iter()
                    .map(|(name, category)| Ingredient {
                        name: (*name).into(),
                        quantity: 1.0,
                        unit: "each".into(),
                        category: (*category).into(),
                    })
                    .collect(),
            ),
            preparation: String::new(),
            source_ref: None,
            protein: protein.map(Into::into),
            tags: vec![],
            favorite: false,
            created_by: Uuid::nil(),
            creator_role: MemberRole::Parent,
            status: ApprovalStatus::Approved,
            approved_by: None,
            approved_at: None,
            archived: false,
            created_at: Utc::now(),
        }
    }

    fn week() -> IsoWeek {
        "2026-W43".parse().unwrap()
    }

    fn scores(pairs: &[(u128, f64)]) -> HashMap<Uuid, RecipeScore> {
        pairs
            .iter()
            .map(|(n, s)| {
                (
                    Uuid::from_u128(*n),
                    RecipeScore {
                        score: *s,
                        rating_count: 1,
                        effective_weight: 1.0,
                    },
                )
            })
            .collect()
    }

    fn pantry() -> Vec<Recipe> {
        vec![
            recipe(1, "Chicken Tacos", Some("chicken"), &[("onion", "produce")]),
            recipe(2, "Beef Stew", Some("beef"), &[("carrot", "produce")]),
            recipe(3, "Salmon Bowl", Some("fish"), &[("rice", "grain")]),
            recipe(4, "Bean Chili", Some("beans"), &[("tomato", "produce")]),
            recipe(5, "Pesto Pasta", None, &[("basil", "produce")]),
            recipe(6, "Chicken Curry", Some("chicken"), &[("rice", "grain")]),
            recipe(7, "Pork Chops", Some("pork"), &[("apple", "produce")]),
            recipe(8, "Tofu Stir Fry", Some("tofu"), &[("broccoli", "produce")]),
        ]
    }

    #[test]
    fn fills_every_day_without_repeats_when_enough_recipes() {
        let recipes = pantry();
        let config = PlannerConfig::default();
        let (s, u) = (HashMap::new(), HashMap::new());
        let ctx = PlanContext {
            week: week(),
            recipes: &recipes,
            scores: &s,
            usage: &u,
            peak_produce: &[],
            config: &config,
            neutral_prior: 3.0,
        };
        let outcome = generate(&ctx).unwrap();
        assert_eq!(outcome.days.len(), 7);
        let unique: HashSet<_> = outcome.days.iter().map(|d| d.recipe_id).collect();
        assert_eq!(unique.len(), 7);
        assert!(outcome.relaxed_days.is_empty());
        assert_eq!(outcome.days[0].weekday, Weekday::Mon);
        assert_eq!(outcome.days[0].date, week().monday());
    }

    #[test]
    fn generation_is_deterministic() {
        let recipes = pantry();
        let config = PlannerConfig::default();
        let s = scores(&[(1, 4.0), (2, 4.0), (3, 3.5), (4, 4.0)]);
        let u = HashMap::new();
        let peak = vec!["tomato".to_string()];
        let ctx = PlanContext {
            week: week(),
            recipes: &recipes,
            scores: &s,
            usage: &u,
            peak_produce: &peak,
            config: &config,
            neutral_prior: 3.0,
        };
        let first = generate(&ctx).unwrap();
        for _ in 0..5 {
            assert_eq!(generate(&ctx).unwrap(), first);
        }
    }

    #[test]
    fn higher_preference_goes_first() {
        let recipes = pantry();
        let config = PlannerConfig::default();
        let s = scores(&[(3, 5.0)]);
        let u = HashMap::new();
        let ctx = PlanContext {
            week: week(),
            recipes: &recipes,
            scores: &s,
            usage: &u,
            peak_produce: &[],
            config: &config,
            neutral_prior: 3.0,
        };
        let outcome = generate(&ctx).unwrap();
        assert_eq!(outcome.days[0].recipe_title, "Salmon Bowl");
    }

    #[test]
    fn unrated_recipes_score_the_configured_prior() {
        let recipes = pantry();
        let config = PlannerConfig::default();
        let s = scores(&[(3, 4.0)]);
        let u = HashMap::new();
        let first_pick = |neutral_prior: f64| {
            let ctx = PlanContext {
                week: week(),
                recipes: &recipes,
                scores: &s,
                usage: &u,
                peak_produce: &[],
                config: &config,
                neutral_prior,
            };
            generate(&ctx).unwrap().days[0].recipe_title.clone()
        };
        assert_eq!(first_pick(1.0), "Salmon Bowl");
        assert_ne!(first_pick(5.0), "Salmon Bowl");
    }

    #[test]
    fn seasonal_bonus_is_capped() {
        let r = recipe(
            1,
            "Harvest Soup",
            None,
            &[("squash", "produce"), ("kale", "produce"), ("leek", "produce"), ("pear", "produce")],
        );
        let weights = RankingWeights::default();
        let peak: Vec<String> = ["squash", "kale", "leek", "pear"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!((seasonal_bonus(&r, &peak[..1], &weights) - 0.3).abs() < 1e-9);
        assert!((seasonal_bonus(&r, &peak, &weights) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn three_recipes_fill_seven_days_with_relaxation() {
        let recipes: Vec<Recipe> = pantry().into_iter().take(3).collect();
        let config = PlannerConfig::default();
        let s = HashMap::new();
        // Recipe 1 was served last week.
        let u: HashMap<Uuid, UsageStats> = [(
            Uuid::from_u128(1),
            UsageStats {
                in_window: true,
                recent_uses: 1,
            },
        )]
        .into_iter()
        .collect();
        let ctx = PlanContext {
            week: week(),
            recipes: &recipes,
            scores: &s,
            usage: &u,
            peak_produce: &[],
            config: &config,
            neutral_prior: 3.0,
        };
        let outcome = generate(&ctx).unwrap();
        assert_eq!(outcome.days.len(), 7);
        // Two strict picks, then the windowed recipe, then repeats.
        assert!(outcome.days[0].relaxed.is_empty());
        assert!(outcome.days[1].relaxed.is_empty());
        assert_eq!(outcome.days[2].recipe_id, Uuid::from_u128(1));
        assert_eq!(outcome.days[2].relaxed, vec![Relaxation::RepeatWindow]);
        assert!(
            outcome.days[3..]
                .iter()
                .all(|d| d.relaxed.contains(&Relaxation::Diversity))
        );
        assert_eq!(outcome.relaxed_days.len(), 5);
    }

    #[test]
    fn zero_eligible_recipes_is_insufficient_data() {
        let mut recipes = pantry();
        for r in &mut recipes {
            r.archived = true;
        }
        recipes[0].archived = false;
        recipes[0].status = ApprovalStatus::PendingApproval;
        let config = PlannerConfig::default();
        let (s, u) = (HashMap::new(), HashMap::new());
        let ctx = PlanContext {
            week: week(),
            recipes: &recipes,
            scores: &s,
            usage: &u,
            peak_produce: &[],
            config: &config,
            neutral_prior: 3.0,
        };
        assert!(matches!(
            generate(&ctx),
            Err(LarderError::InsufficientData { .. })
        ));
    }

    #[test]
    fn never_plans_unapproved_or_archived_recipes() {
        let mut recipes = pantry();
        recipes[0].status = ApprovalStatus::PendingApproval;
        recipes[1].archived = true;
        let config = PlannerConfig::default();
        let (s, u) = (HashMap::new(), HashMap::new());
        let ctx = PlanContext {
            week: week(),
            recipes: &recipes,
            scores: &s,
            usage: &u,
            peak_produce: &[],
            config: &config,
            neutral_prior: 3.0,
        };
        let outcome = generate(&ctx).unwrap();
        assert!(
            outcome
                .days
                .iter()
                .all(|d| d.recipe_id != Uuid::from_u128(1) && d.recipe_id != Uuid::from_u128(2))
        );
    }

    #[test]
    fn partial_week_plans_only_configured_days() {
        let recipes = pantry();
        let config = PlannerConfig {
            days: vec![Weekday::Fri, Weekday::Mon, Weekday::Wed],
            ..PlannerConfig::default()
        };
        let (s, u) = (HashMap::new(), HashMap::new());
        let ctx = PlanContext {
            week: week(),
            recipes: &recipes,
            scores: &s,
            usage: &u,
            peak_produce: &[],
            config: &config,
            neutral_prior: 3.0,
        };
        let outcome = generate(&ctx).unwrap();
        let weekdays: Vec<_> = outcome.days.iter().map(|d| d.weekday).collect();
        assert_eq!(weekdays, vec![Weekday::Mon, Weekday::Wed, Weekday::Fri]);
    }

    #[test]
    fn diversity_prefers_new_proteins() {
        // Two chicken dishes score highest; the second must wait until a
        // different protein has been used.
        let recipes = vec![
            recipe(1, "Chicken Tacos", Some("chicken"), &[]),
            recipe(2, "Chicken Curry", Some("chicken"), &[]),
            recipe(3, "Beef Stew", Some("beef"), &[]),
        ];
        let config = PlannerConfig {
            days: vec![Weekday::Mon, Weekday::Tue],
            ..PlannerConfig::default()
        };
        let s = scores(&[(1, 4.0), (2, 4.0), (3, 3.8)]);
        let u = HashMap::new();
        let ctx = PlanContext {
            week: week(),
            recipes: &recipes,
            scores: &s,
            usage: &u,
            peak_produce: &[],
            config: &config,
            neutral_prior: 3.0,
        };
        let outcome = generate(&ctx).unwrap();
        assert_eq!(outcome.days[0].recipe_id, Uuid::from_u128(1));
        assert_eq!(outcome.days[1].recipe_id, Uuid::from_u128(3));
    }

    #[test]
    fn ties_break_on_recent_use_then_id() {
        let recipes = vec![
            recipe(2, "B", None, &[]),
            recipe(1, "A", None, &[]),
            recipe(3, "C", None, &[]),
        ];
        let config = PlannerConfig {
            days: vec![Weekday::Mon, Weekday::Tue, Weekday::Wed],
            ..PlannerConfig::default()
        };
        let s = HashMap::new();
        let u: HashMap<Uuid, UsageStats> = [(
            Uuid::from_u128(1),
            UsageStats {
                in_window: false,
                recent_uses: 3,
            },
        )]
        .into_iter()
        .collect();
        let ctx = PlanContext {
            week: week(),
            recipes: &recipes,
            scores: &s,
            usage: &u,
            peak_produce: &[],
            config: &config,
            neutral_prior: 3.0,
        };
        let ids: Vec<_> = generate(&ctx)
            .unwrap()
            .days
            .iter()
            .map(|d| d.recipe_id.as_u128())
            .collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn usage_counts_window_and_history() {
        let w = week();
        let config = PlannerConfig::default();
        let plan = |weeks_back: u32, ids: &[u128], superseded: bool| MealPlan {
            id: Uuid::new_v4(),
            family_id: Uuid::nil(),
            week: w.weeks_before(weeks_back).to_string(),
            week_start: w.weeks_before(weeks_back).monday(),
            days: Json(
                ids.iter()
                    .map(|n| PlannedDay {
                        weekday: Weekday::Mon,
                        date: w.weeks_before(weeks_back).monday(),
                        recipe_id: Uuid::from_u128(*n),
                        recipe_title: String::new(),
                        relaxed: vec![],
                    })
                    .collect(),
            ),
            status: ApprovalStatus::Approved,
            created_by: Uuid::nil(),
            approved_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            approved_at: None,
            superseded_at: superseded.then(Utc::now),
        };
        let history = vec![
            plan(1, &[1], false),
            plan(5, &[2, 2], false),
            plan(1, &[3], true),
        ];
        let usage = usage_from_history(&history, w, &config);
        assert_eq!(
            usage[&Uuid::from_u128(1)],
            UsageStats {
                in_window: true,
                recent_uses: 1
            }
        );
        assert_eq!(
            usage[&Uuid::from_u128(2)],
            UsageStats {
                in_window: false,
                recent_uses: 2
            }
        );
        assert!(!usage.contains_key(&Uuid::from_u128(3)));
    }

    #[test]
    fn reselect_day_picks_a_different_recipe() {
        let recipes = pantry();
        let config = PlannerConfig::default();
        let (s, u) = (HashMap::new(), HashMap::new());
        let ctx = PlanContext {
            week: week(),
            recipes: &recipes,
            scores: &s,
            usage: &u,
            peak_produce: &[],
            config: &config,
            neutral_prior: 3.0,
        };
        let outcome = generate(&ctx).unwrap();
        let tuesday = outcome.days[1].recipe_id;
        let swapped = reselect_day(&ctx, &outcome.days, Weekday::Tue).unwrap();
        assert_eq!(swapped.weekday, Weekday::Tue);
        assert_ne!(swapped.recipe_id, tuesday);
        // Seven of eight recipes were in use; the spare one is the only
        // strict pick.
        let used: HashSet<_> = outcome.days.iter().map(|d| d.recipe_id).collect();
        assert!(!used.contains(&swapped.recipe_id));
        assert!(swapped.relaxed.is_empty());
    }

    #[test]
    fn reselect_unknown_day_is_validation_error() {
        let recipes = pantry();
        let config = PlannerConfig {
            days: vec![Weekday::Mon],
            ..PlannerConfig::default()
        };
        let (s, u) = (HashMap::new(), HashMap::new());
        let ctx = PlanContext {
            week: week(),
            recipes: &recipes,
            scores: &s,
            usage: &u,
            peak_produce: &[],
            config: &config,
            neutral_prior: 3.0,
        };
        let outcome = generate(&ctx).unwrap();
        assert!(matches!(
            reselect_day(&ctx, &outcome.days, Weekday::Sun),
            Err(LarderError::Validation(_))
        ));
    }

    #[test]
    fn summary_counts_proteins_vegetables_and_season() {
        let recipes = pantry();
        let config = PlannerConfig::default();
        let days: Vec<PlannedDay> = [1u128, 3, 4]
            .iter()
            .zip([Weekday::Mon, Weekday::Tue, Weekday::Wed])
            .map(|(n, wd)| {
                let r = recipes.iter().find(|r| r.id == Uuid::from_u128(*n)).unwrap();
                planned_day(week(), wd, r, if *n == 4 { vec![Relaxation::RepeatWindow] } else { vec![] })
            })
            .collect();
        let peak = vec!["tomato".to_string(), "squash".to_string()];
        let summary = summarize("2026-W43", &days, &recipes, &peak, &config);
        assert_eq!(summary.distinct_proteins, vec!["beans", "chicken", "fish"]);
        assert_eq!(summary.vegetable_days, 2);
        assert_eq!(summary.seasonal_items, vec!["tomato"]);
        assert_eq!(summary.relaxed_days, vec![Weekday::Wed]);
        let text = summary.to_string();
        assert!(text.contains("Meal plan for 2026-W43"));
        assert!(text.contains("Wed Oct 21: Bean Chili *"));
    }

    #[test]
    fn config_validation() {
        assert!(PlannerConfig::default().validate().is_ok());
        let dup = PlannerConfig {
            days: vec![Weekday::Mon, Weekday::Mon],
            ..PlannerConfig::default()
        };
        assert!(dup.validate().is_err());
        let empty = PlannerConfig {
            days: vec![],
            ..PlannerConfig::default()
        };
        assert!(empty.validate().is_err());
    }
}

//! End-of-week feedback: how adults and kids rated each dinner of the
//! family's approved plan.

use std::fmt;

use sqlx::PgPool;
use uuid::Uuid;

use larder_db::models::{MealPlan, RaterClass, Rating};
use larder_db::queries::{meal_plans, ratings};

use crate::error::{LarderError, Result};
use crate::notify::Notification;
use crate::week::IsoWeek;

/// Plain mean of one rater class's scores.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClassAverage {
    pub count: usize,
    total: i64,
}

impl ClassAverage {
    fn add(&mut self, score: i16) {
        self.count += 1;
        self.total += i64::from(score);
    }

    /// `None` until someone in the class has rated the recipe.
    pub fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| self.total as f64 / self.count as f64)
    }
}

impl fmt::Display for ClassAverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.average() {
            Some(avg) => write!(f, "{avg:.1}/5"),
            None => f.write_str("-"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MealFeedback {
    pub recipe_id: Uuid,
    pub recipe_title: String,
    pub adult: ClassAverage,
    pub kid: ClassAverage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyFeedback {
    pub week: String,
    pub plan_id: Uuid,
    /// One entry per planned recipe, in plan order.
    pub meals: Vec<MealFeedback>,
}

impl WeeklyFeedback {
    pub fn has_ratings(&self) -> bool {
        self.meals.iter().any(|m| m.adult.count + m.kid.count > 0)
    }
}

impl fmt::Display for WeeklyFeedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "This week's ratings ({})", self.week)?;
        if !self.has_ratings() {
            return writeln!(f, "  No ratings collected this week.");
        }
        for meal in &self.meals {
            writeln!(f, "  {}", meal.recipe_title)?;
            writeln!(f, "    Adults: {} | Kids: {}", meal.adult, meal.kid)?;
        }
        Ok(())
    }
}

/// Average every rating of the plan's recipes, adults and kids apart.
/// Ratings of other recipes are ignored.
pub fn summarize(plan: &MealPlan, ratings: &[Rating]) -> WeeklyFeedback {
    let mut meals: Vec<MealFeedback> = Vec::with_capacity(plan.days.len());
    for day in plan.days.iter() {
        if meals.iter().any(|m| m.recipe_id == day.recipe_id) {
            continue;
        }
        meals.push(MealFeedback {
            recipe_id: day.recipe_id,
            recipe_title: day.recipe_title.clone(),
            adult: ClassAverage::default(),
            kid: ClassAverage::default(),
        });
    }

    for rating in ratings {
        let Some(meal) = meals.iter_mut().find(|m| m.recipe_id == rating.recipe_id) else {
            continue;
        };
        match rating.rater_class {
            RaterClass::Adult => meal.adult.add(rating.score),
            RaterClass::Kid => meal.kid.add(rating.score),
        }
    }

    WeeklyFeedback {
        week: plan.week.clone(),
        plan_id: plan.id,
        meals,
    }
}

/// Feedback over the family's current approved plan for `week`.
pub async fn weekly_feedback(
    pool: &PgPool,
    family_id: Uuid,
    week: IsoWeek,
) -> Result<WeeklyFeedback> {
    let key = week.to_string();
    let plan = meal_plans::get_current_approved_plan(pool, family_id, &key)
        .await?
        .ok_or_else(|| LarderError::not_found("approved meal plan", &key))?;
    let family_ratings = ratings::list_ratings_for_family(pool, family_id).await?;

    let feedback = summarize(&plan, &family_ratings);
    tracing::debug!(
        %family_id,
        week = %key,
        meals = feedback.meals.len(),
        rated = feedback.has_ratings(),
        "weekly feedback summarized"
    );
    Ok(feedback)
}

/// The summary as a message for the family.
pub fn summary_notification(feedback: &WeeklyFeedback) -> Notification {
    Notification::text(format!(
        "{feedback}Thanks for the feedback! Next week's plan will take it into account."
    ))
}

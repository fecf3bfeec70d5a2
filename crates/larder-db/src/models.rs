use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Approval status shared by recipes, meal plans and grocery lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Draft,
    PendingApproval,
    Approved,
    Rejected,
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

impl FromStr for ApprovalStatus {
    type Err = ApprovalStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "pending_approval" => Ok(Self::PendingApproval),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(ApprovalStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`ApprovalStatus`] string.
#[derive(Debug, Clone)]
pub struct ApprovalStatusParseError(pub String);

impl fmt::Display for ApprovalStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid approval status: {:?}", self.0)
    }
}

impl std::error::Error for ApprovalStatusParseError {}

// ---------------------------------------------------------------------------

/// Role of a family member. Only parents may approve or reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Parent,
    Kid,
}

impl MemberRole {
    /// Preference weight a new member of this role gets unless told otherwise.
    pub fn default_preference_weight(self) -> f64 {
        match self {
            Self::Parent => 1.0,
            Self::Kid => 1.5,
        }
    }

    /// The rating class members of this role rate with.
    pub fn rater_class(self) -> RaterClass {
        match self {
            Self::Parent => RaterClass::Adult,
            Self::Kid => RaterClass::Kid,
        }
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Parent => "parent",
            Self::Kid => "kid",
        };
        f.write_str(s)
    }
}

impl FromStr for MemberRole {
    type Err = MemberRoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parent" => Ok(Self::Parent),
            "kid" => Ok(Self::Kid),
            other => Err(MemberRoleParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`MemberRole`] string.
#[derive(Debug, Clone)]
pub struct MemberRoleParseError(pub String);

impl fmt::Display for MemberRoleParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid member role: {:?}", self.0)
    }
}

impl std::error::Error for MemberRoleParseError {}

// ---------------------------------------------------------------------------

/// Class of a rater: kids rate with emoji reactions, adults with stars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RaterClass {
    Kid,
    Adult,
}

impl fmt::Display for RaterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Kid => "kid",
            Self::Adult => "adult",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------

/// Emoji reaction a kid gives a meal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum KidReaction {
    Yummy,
    Okay,
    Yucky,
}

impl KidReaction {
    /// Star-equivalent score stored alongside the reaction.
    pub fn score(self) -> i16 {
        match self {
            Self::Yummy => 5,
            Self::Okay => 3,
            Self::Yucky => 1,
        }
    }
}

impl fmt::Display for KidReaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Yummy => "yummy",
            Self::Okay => "okay",
            Self::Yucky => "yucky",
        };
        f.write_str(s)
    }
}

impl FromStr for KidReaction {
    type Err = KidReactionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yummy" => Ok(Self::Yummy),
            "okay" => Ok(Self::Okay),
            "yucky" => Ok(Self::Yucky),
            other => Err(KidReactionParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`KidReaction`] string.
#[derive(Debug, Clone)]
pub struct KidReactionParseError(pub String);

impl fmt::Display for KidReactionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid kid reaction: {:?} (expected yummy, okay or yucky)", self.0)
    }
}

impl std::error::Error for KidReactionParseError {}

// ---------------------------------------------------------------------------

/// A constraint the planner loosened to fill a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relaxation {
    /// A recipe served inside the repeat-avoidance window was admitted.
    RepeatWindow,
    /// A recipe already chosen this week was chosen again.
    Diversity,
}

impl fmt::Display for Relaxation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RepeatWindow => "repeat_window",
            Self::Diversity => "diversity",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// JSONB payloads
// ---------------------------------------------------------------------------

/// One ingredient line of a recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub quantity: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub category: String,
}

/// One day of a meal plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedDay {
    pub weekday: Weekday,
    pub date: NaiveDate,
    pub recipe_id: Uuid,
    pub recipe_title: String,
    /// Constraints relaxed to fill this day; empty for a strict pick.
    #[serde(default)]
    pub relaxed: Vec<Relaxation>,
}

/// One line of a grocery list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroceryItem {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub category: String,
    /// Assigned store id; `None` is the "any store" bucket.
    pub store: Option<String>,
    #[serde(default)]
    pub recipe_sources: Vec<String>,
}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A family -- the tenant every other record hangs off.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Family {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A member of a family.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FamilyMember {
    pub id: Uuid,
    pub family_id: Uuid,
    pub display_name: String,
    pub role: MemberRole,
    pub preference_weight: f64,
    pub chat_user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A structured recipe record.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Recipe {
    pub id: Uuid,
    pub family_id: Uuid,
    pub title: String,
    pub ingredients: Json<Vec<Ingredient>>,
    pub preparation: String,
    pub source_ref: Option<String>,
    pub protein: Option<String>,
    pub tags: Vec<String>,
    pub favorite: bool,
    pub created_by: Uuid,
    pub creator_role: MemberRole,
    pub status: ApprovalStatus,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

impl Recipe {
    /// Whether the planner may put this recipe on a plan.
    pub fn is_plannable(&self) -> bool {
        self.status == ApprovalStatus::Approved && !self.archived
    }
}

/// A rating of a recipe. Ratings are never updated once written.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Rating {
    pub id: Uuid,
    pub recipe_id: Uuid,
    pub member_id: Uuid,
    pub rater_class: RaterClass,
    pub score: i16,
    pub kid_reaction: Option<KidReaction>,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A weekly meal plan.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MealPlan {
    pub id: Uuid,
    pub family_id: Uuid,
    /// ISO week, e.g. `2026-W43`.
    pub week: String,
    pub week_start: NaiveDate,
    pub days: Json<Vec<PlannedDay>>,
    pub status: ApprovalStatus,
    pub created_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub superseded_at: Option<DateTime<Utc>>,
}

impl MealPlan {
    /// Approved and not replaced by a later approval.
    pub fn is_current_approved(&self) -> bool {
        self.status == ApprovalStatus::Approved && self.superseded_at.is_none()
    }
}

/// A grocery list derived from one approved meal plan.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GroceryList {
    pub id: Uuid,
    pub family_id: Uuid,
    pub plan_id: Uuid,
    pub items: Json<Vec<GroceryItem>>,
    pub status: ApprovalStatus,
    pub approved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub superseded_at: Option<DateTime<Utc>>,
    pub synced_at: Option<DateTime<Utc>>,
}

impl GroceryList {
    /// Approved and not replaced by a later approval.
    pub fn is_current_approved(&self) -> bool {
        self.status == ApprovalStatus::Approved && self.superseded_at.is_none()
    }
}

/// A held generation lease.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GenerationLock {
    pub lock_key: String,
    pub holder: Uuid,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

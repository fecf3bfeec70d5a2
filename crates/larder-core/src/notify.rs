//! Notifications: approval prompts, the nightly rating prompt and the
//! `Notifier` trait that delivers them to family members.

use std::time::Duration;

use chrono::NaiveDate;

use async_trait::async_trait;
use futures::future::join_all;
use sqlx::PgPool;
use uuid::Uuid;

use larder_db::models::{FamilyMember, KidReaction, MealPlan};
use larder_db::queries::families;

use crate::approval::EntityKind;
use crate::error::{LarderError, Result};
use crate::external::call_with_timeout;

/// Visual emphasis of an action button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStyle {
    Primary,
    Plain,
    Danger,
}

/// A button the recipient can press to act on the notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionButton {
    pub label: String,
    /// Identifier of the action, e.g. `approve_meal_plan`.
    pub action_id: String,
    /// Entity the action applies to.
    pub value: String,
    pub style: ButtonStyle,
}

/// A message with optional action buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub text: String,
    pub buttons: Vec<ActionButton>,
}

impl Notification {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            buttons: Vec::new(),
        }
    }
}

fn button(label: &str, verb: &str, kind: EntityKind, id: Uuid, style: ButtonStyle) -> ActionButton {
    ActionButton {
        label: label.to_owned(),
        action_id: format!("{verb}_{}", kind.as_str().replace(' ', "_")),
        value: id.to_string(),
        style,
    }
}

/// Prompt asking a parent to approve an entity. Plans and lists offer
/// Approve, View Details and Regenerate; recipes offer Reject in place of
/// Regenerate.
pub fn approval_prompt(kind: EntityKind, id: Uuid, summary: &str) -> Notification {
    let last = match kind {
        EntityKind::Recipe => button("Reject", "reject", kind, id, ButtonStyle::Danger),
        EntityKind::MealPlan | EntityKind::GroceryList => {
            button("Regenerate", "regenerate", kind, id, ButtonStyle::Plain)
        }
    };
    Notification {
        text: format!("{}\nThis {kind} is waiting for a parent's approval.", summary.trim_end()),
        buttons: vec![
            button("Approve", "approve", kind, id, ButtonStyle::Primary),
            button("View Details", "view", kind, id, ButtonStyle::Plain),
            last,
        ],
    }
}

/// Prompt asking the family how the meal planned for `date` went: star
/// buttons for adults and reaction buttons for kids. `None` when the plan
/// has nothing on that date.
///
/// Button values are `<recipe-id>:<stars>` and `<recipe-id>:<reaction>`.
pub fn rating_prompt(plan: &MealPlan, date: NaiveDate) -> Option<Notification> {
    let day = plan.days.iter().find(|d| d.date == date)?;
    let recipe = day.recipe_id;

    let mut buttons: Vec<ActionButton> = (1..=5)
        .map(|stars| ActionButton {
            label: if stars == 1 {
                "1 star".to_owned()
            } else {
                format!("{stars} stars")
            },
            action_id: "rate_adult".to_owned(),
            value: format!("{recipe}:{stars}"),
            style: ButtonStyle::Plain,
        })
        .collect();
    for (label, reaction, style) in [
        ("Yummy!", KidReaction::Yummy, ButtonStyle::Primary),
        ("It's okay", KidReaction::Okay, ButtonStyle::Plain),
        ("Yucky", KidReaction::Yucky, ButtonStyle::Danger),
    ] {
        buttons.push(ActionButton {
            label: label.to_owned(),
            action_id: "rate_kid".to_owned(),
            value: format!("{recipe}:{reaction}"),
            style,
        });
    }

    Some(Notification {
        text: format!(
            "How was {}?
Adults: rate it 1-5. Kids: how was it?",
            day.recipe_title
        ),
        buttons,
    })
}

/// Who a notification goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub member_id: Uuid,
    pub display_name: String,
    pub chat_user_id: Option<String>,
}

impl From<&FamilyMember> for Recipient {
    fn from(member: &FamilyMember) -> Self {
        Self {
            member_id: member.id,
            display_name: member.display_name.clone(),
            chat_user_id: member.chat_user_id.clone(),
        }
    }
}

/// Delivery channel for notifications.
///
/// # Object Safety
///
/// Object-safe; held as `&dyn Notifier` by callers.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver one notification to one recipient.
    async fn notify(&self, recipient: &Recipient, notification: &Notification)
    -> anyhow::Result<()>;
}

// Compile-time assertion: Notifier must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn Notifier) {}
};

/// Outcome of notifying several recipients.
#[derive(Debug, Default)]
pub struct NotifyReport {
    pub delivered: Vec<Uuid>,
    pub failed: Vec<(Uuid, LarderError)>,
}

impl NotifyReport {
    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Notify every recipient concurrently. Individual failures are collected
/// in the report rather than aborting the others.
pub async fn notify_all(
    notifier: &dyn Notifier,
    recipients: &[Recipient],
    notification: &Notification,
    timeout: Duration,
) -> NotifyReport {
    let sends = recipients.iter().map(|recipient| async move {
        let result = call_with_timeout(
            notifier.name(),
            timeout,
            notifier.notify(recipient, notification),
        )
        .await;
        (recipient.member_id, result)
    });

    let mut report = NotifyReport::default();
    for (member_id, result) in join_all(sends).await {
        match result {
            Ok(()) => report.delivered.push(member_id),
            Err(e) => report.failed.push((member_id, e)),
        }
    }
    report
}

/// Notify all parents of a family.
pub async fn notify_parents(
    pool: &PgPool,
    notifier: &dyn Notifier,
    family_id: Uuid,
    notification: &Notification,
    timeout: Duration,
) -> Result<NotifyReport> {
    let recipients: Vec<Recipient> = families::list_parents(pool, family_id)
        .await?
        .iter()
        .map(Recipient::from)
        .collect();
    let report = notify_all(notifier, &recipients, notification, timeout).await;
    if !report.all_delivered() {
        tracing::warn!(
            %family_id,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "some parents were not notified"
        );
    }
    Ok(report)
}

/// Notify every member of a family, parents and kids alike.
pub async fn notify_family(
    pool: &PgPool,
    notifier: &dyn Notifier,
    family_id: Uuid,
    notification: &Notification,
    timeout: Duration,
) -> Result<NotifyReport> {
    let recipients: Vec<Recipient> = families::list_members(pool, family_id)
        .await?
        .iter()
        .map(Recipient::from)
        .collect();
    let report = notify_all(notifier, &recipients, notification, timeout).await;
    if !report.all_delivered() {
        tracing::warn!(
            %family_id,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "some members were not notified"
        );
    }
    Ok(report)
}

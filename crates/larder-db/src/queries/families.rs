//! Database query functions for the `families` and `family_members` tables.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Family, FamilyMember, MemberRole};

/// Insert a new family. Returns the inserted row.
pub async fn insert_family(pool: &PgPool, name: &str) -> Result<Family> {
    let family = sqlx::query_as::<_, Family>(
        "INSERT INTO families (name) VALUES ($1) RETURNING *",
    )
    .bind(name)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert family {name:?}"))?;

    Ok(family)
}

/// Fetch a family by ID.
pub async fn get_family(pool: &PgPool, id: Uuid) -> Result<Option<Family>> {
    let family = sqlx::query_as::<_, Family>("SELECT * FROM families WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch family")?;

    Ok(family)
}

/// Fetch a family by its unique name.
pub async fn get_family_by_name(pool: &PgPool, name: &str) -> Result<Option<Family>> {
    let family = sqlx::query_as::<_, Family>("SELECT * FROM families WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("failed to fetch family by name")?;

    Ok(family)
}

/// List all families, ordered by name.
pub async fn list_families(pool: &PgPool) -> Result<Vec<Family>> {
    let families = sqlx::query_as::<_, Family>("SELECT * FROM families ORDER BY name")
        .fetch_all(pool)
        .await
        .context("failed to list families")?;

    Ok(families)
}

/// Fields for a new family member.
#[derive(Debug, Clone)]
pub struct NewMember<'a> {
    pub family_id: Uuid,
    pub display_name: &'a str,
    pub role: MemberRole,
    pub preference_weight: f64,
    pub chat_user_id: Option<&'a str>,
}

/// Insert a family member. Returns the inserted row.
pub async fn insert_member(pool: &PgPool, member: &NewMember<'_>) -> Result<FamilyMember> {
    let row = sqlx::query_as::<_, FamilyMember>(
        "INSERT INTO family_members (family_id, display_name, role, preference_weight, chat_user_id) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING *",
    )
    .bind(member.family_id)
    .bind(member.display_name)
    .bind(member.role)
    .bind(member.preference_weight)
    .bind(member.chat_user_id)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert member {:?}", member.display_name))?;

    Ok(row)
}

/// Fetch a member by ID.
pub async fn get_member(pool: &PgPool, id: Uuid) -> Result<Option<FamilyMember>> {
    let member = sqlx::query_as::<_, FamilyMember>("SELECT * FROM family_members WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch family member")?;

    Ok(member)
}

/// Fetch a member of a family by display name.
pub async fn get_member_by_name(
    pool: &PgPool,
    family_id: Uuid,
    display_name: &str,
) -> Result<Option<FamilyMember>> {
    let member = sqlx::query_as::<_, FamilyMember>(
        "SELECT * FROM family_members WHERE family_id = $1 AND display_name = $2",
    )
    .bind(family_id)
    .bind(display_name)
    .fetch_optional(pool)
    .await
    .context("failed to fetch family member by name")?;

    Ok(member)
}

/// List the members of a family, parents first, then by name.
pub async fn list_members(pool: &PgPool, family_id: Uuid) -> Result<Vec<FamilyMember>> {
    let members = sqlx::query_as::<_, FamilyMember>(
        "SELECT * FROM family_members WHERE family_id = $1 \
         ORDER BY role = 'kid', display_name",
    )
    .bind(family_id)
    .fetch_all(pool)
    .await
    .context("failed to list family members")?;

    Ok(members)
}

/// List the parents of a family.
pub async fn list_parents(pool: &PgPool, family_id: Uuid) -> Result<Vec<FamilyMember>> {
    let members = sqlx::query_as::<_, FamilyMember>(
        "SELECT * FROM family_members WHERE family_id = $1 AND role = 'parent' \
         ORDER BY display_name",
    )
    .bind(family_id)
    .fetch_all(pool)
    .await
    .context("failed to list parents")?;

    Ok(members)
}

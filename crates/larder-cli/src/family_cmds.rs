//! CLI handlers for `larder family` and `larder member`.

use anyhow::{Result, anyhow};

use larder_db::models::MemberRole;
use larder_db::queries::families::{self, NewMember};

use crate::session::Session;
use crate::{FamilyCommands, MemberCommands};

pub async fn run_family_command(command: FamilyCommands, session: &Session) -> Result<()> {
    match command {
        FamilyCommands::Create { name } => {
            let name = name.trim();
            if name.is_empty() {
                anyhow::bail!("family name must not be empty");
            }
            let family = families::insert_family(&session.pool, name).await?;
            println!("Family created.");
            println!("  ID:    {}", family.id);
            println!("  Name:  {}", family.name);
            println!();
            println!("Next: `larder member add <name> --role parent --family {:?}`", family.name);
            Ok(())
        }
        FamilyCommands::List => {
            let all = families::list_families(&session.pool).await?;
            if all.is_empty() {
                println!("No families found. Use `larder family create <name>` to create one.");
                return Ok(());
            }
            for family in &all {
                println!("{}  {}", family.id, family.name);
            }
            Ok(())
        }
    }
}

pub async fn run_member_command(command: MemberCommands, session: &Session) -> Result<()> {
    match command {
        MemberCommands::Add {
            name,
            role,
            weight,
            chat_id,
        } => {
            let family = session.family().await?;
            let role: MemberRole = role.parse().map_err(|e| anyhow!("{e}"))?;

            // The first parent bootstraps the family; after that only a
            // parent may add members.
            let parents = families::list_parents(&session.pool, family.id).await?;
            if !parents.is_empty() {
                let actor = session.actor().await?;
                actor.ensure_family(family.id, "add family members")?;
                actor.parent_capability("add family members")?;
            } else if role != MemberRole::Parent {
                anyhow::bail!("the first member of a family must be a parent");
            }

            let weight = weight.unwrap_or_else(|| role.default_preference_weight());
            if !weight.is_finite() || weight <= 0.0 {
                anyhow::bail!("preference weight must be positive, got {weight}");
            }
            let member = families::insert_member(
                &session.pool,
                &NewMember {
                    family_id: family.id,
                    display_name: name.trim(),
                    role,
                    preference_weight: weight,
                    chat_user_id: chat_id.as_deref(),
                },
            )
            .await?;
            println!(
                "Added {} ({}, weight {}) to {}.",
                member.display_name, member.role, member.preference_weight, family.name
            );
            Ok(())
        }
        MemberCommands::List => {
            let family = session.family().await?;
            let members = families::list_members(&session.pool, family.id).await?;
            println!("{}:", family.name);
            for member in &members {
                println!(
                    "  {:<20} {:<6} weight {}",
                    member.display_name,
                    member.role.to_string(),
                    member.preference_weight
                );
            }
            Ok(())
        }
    }
}

//! Local stand-ins for the chat and task-manager services: notifications
//! are printed and grocery exports are written as JSON files.

use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;

use larder_core::notify::{Notification, Notifier, Recipient};
use larder_core::sync::{GroceryExport, SyncReceipt, TaskSync};

/// Prints notifications to stdout.
#[derive(Debug, Default)]
pub struct StdoutNotifier;

#[async_trait]
impl Notifier for StdoutNotifier {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn notify(&self, recipient: &Recipient, notification: &Notification) -> anyhow::Result<()> {
        println!("-> {}", recipient.display_name);
        for line in notification.text.lines() {
            println!("   {line}");
        }
        if !notification.buttons.is_empty() {
            let buttons: Vec<String> = notification
                .buttons
                .iter()
                .map(|b| format!("[{}]", b.label))
                .collect();
            println!("   {}", buttons.join(" "));
        }
        Ok(())
    }
}

/// Writes each export to a JSON file.
#[derive(Debug)]
pub struct JsonFileSync {
    pub path: PathBuf,
}

#[async_trait]
impl TaskSync for JsonFileSync {
    fn name(&self) -> &str {
        "json-file"
    }

    async fn push(&self, export: &GroceryExport) -> anyhow::Result<SyncReceipt> {
        let json = serde_json::to_string_pretty(export).context("failed to serialize export")?;
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(SyncReceipt {
            tasks_created: export.lines.len(),
            location: Some(self.path.display().to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use larder_core::sync::ExportLine;
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn json_sync_writes_every_line() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("groceries.json");
        let export = GroceryExport {
            list_id: Uuid::new_v4(),
            plan_id: Uuid::new_v4(),
            week: "2026-W43".into(),
            lines: vec![ExportLine {
                item: "milk".into(),
                quantity: "2 cup".into(),
                store: "Any store".into(),
                title: "2 cup milk".into(),
            }],
        };

        let receipt = JsonFileSync { path: path.clone() }.push(&export).await.unwrap();
        assert_eq!(receipt.tasks_created, 1);

        let written: GroceryExport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, export);
    }
}

use anyhow::Result;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;

use starindex::dictionary::StaticDictionary;
use starindex::index_advisor::{duplicate_key_check, AdviceReport, AdvisorConfig, IndexAdvisor};
use starindex::types::IndexAction;

const SNAPSHOT: &str = r#"{
    "default_database": "shop",
    "databases": {
        "shop": {
            "orders": {
                "columns": [
                    {"name": "id", "data_type": "bigint(20)"},
                    {"name": "customer_id", "data_type": "int(11)"},
                    {"name": "status", "data_type": "varchar(16)", "character_set": "utf8mb4"},
                    {"name": "note", "data_type": "text", "character_set": "utf8"},
                    {"name": "created_at", "data_type": "datetime"}
                ],
                "indexes": [
                    {"key_name": "PRIMARY", "column_name": "id", "seq_in_index": 1, "non_unique": false},
                    {"key_name": "idx_status", "column_name": "status", "seq_in_index": 1, "non_unique": true},
                    {"key_name": "idx_status_created", "column_name": "status", "seq_in_index": 1, "non_unique": true},
                    {"key_name": "idx_status_created", "column_name": "created_at", "seq_in_index": 2, "non_unique": true}
                ],
                "cardinality": {"customer_id": 0.9, "status": 0.1, "created_at": 0.7}
            },
            "customers": {
                "columns": [
                    {"name": "id", "data_type": "int(11)"},
                    {"name": "region", "data_type": "char(2)", "character_set": "latin1"}
                ],
                "indexes": [
                    {"key_name": "PRIMARY", "column_name": "id", "seq_in_index": 1, "non_unique": false}
                ],
                "cardinality": {"region": 0.01}
            },
            "active_orders": {"view": true, "columns": [{"name": "id", "data_type": "bigint(20)"}]}
        }
    }
}"#;

/// Temporary directory holding a schema snapshot
struct Fixture {
    dir: TempDir,
    schema: PathBuf,
}

impl Fixture {
    fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        let schema = dir.path().join("schema.json");
        fs::write(&schema, SNAPSHOT)?;
        Ok(Self { dir, schema })
    }

    fn advisor(&self, config: AdvisorConfig) -> Result<IndexAdvisor> {
        let dictionary = StaticDictionary::from_file(&self.schema)?;
        Ok(IndexAdvisor::with_dictionary(config, Arc::new(dictionary)))
    }
}

#[test]
fn test_advice_from_schema_snapshot() -> Result<()> {
    let fixture = Fixture::new()?;
    let advisor = fixture.advisor(AdvisorConfig::default())?;

    let candidates = advisor.advise_sql(
        "SELECT o.id FROM orders o JOIN customers c ON o.customer_id = c.id \
         WHERE c.region = 'EU' AND o.created_at >= '2024-01-01' ORDER BY o.created_at",
    )?;
    let ddls: Vec<&str> = candidates.iter().map(|c| c.ddl.as_str()).collect();
    assert_eq!(
        ddls,
        vec![
            "ALTER TABLE `shop`.`orders` ADD INDEX `idx_customer_id` (`customer_id`)",
            "ALTER TABLE `shop`.`customers` ADD INDEX `idx_region` (`region`)",
            "ALTER TABLE `shop`.`orders` ADD INDEX `idx_created_at` (`created_at`)",
        ]
    );
    Ok(())
}

#[test]
fn test_existing_composite_index_absorbs_advice() -> Result<()> {
    let fixture = Fixture::new()?;
    let advisor = fixture.advisor(AdvisorConfig::default())?;

    let candidates = advisor.advise_sql("SELECT * FROM orders WHERE status = 'new' ORDER BY created_at")?;
    assert!(candidates.is_empty());
    Ok(())
}

#[test]
fn test_views_and_prefixes() -> Result<()> {
    let fixture = Fixture::new()?;
    let advisor = fixture.advisor(AdvisorConfig::default())?;

    assert!(advisor.advise_sql("SELECT * FROM active_orders WHERE id = 1")?.is_empty());

    let candidates = advisor.advise_sql("SELECT id FROM orders WHERE note = 'gift' AND customer_id = 7")?;
    assert_eq!(candidates.len(), 1);
    assert_eq!(
        candidates[0].ddl,
        "ALTER TABLE `shop`.`orders` ADD INDEX `idx_customer_id_note` (`customer_id`, `note`(255))"
    );
    Ok(())
}

#[test]
fn test_drop_proposals_and_report() -> Result<()> {
    let fixture = Fixture::new()?;
    let config = AdvisorConfig {
        allow_drop_index: true,
        ..AdvisorConfig::default()
    };
    let advisor = fixture.advisor(config)?;

    let candidates = advisor.advise_sql("SELECT * FROM orders WHERE status = 'new' AND created_at > NOW() AND note IS NULL")?;
    // (status, note, created_at) extends idx_status but not idx_status_created
    let drops: Vec<&str> = candidates
        .iter()
        .filter(|c| c.action == IndexAction::Drop)
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(drops, vec!["idx_status"]);
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[1].column_names(), vec!["status", "note", "created_at"]);

    let report = AdviceReport::build(&candidates, true);
    assert_eq!(report.items.len(), 1);
    assert_eq!(report.items[0].item, "IDX.001");
    assert!(report.items[0].merged_ddl.starts_with("ALTER TABLE `shop`.`orders` DROP INDEX `idx_status`, "));

    let json: serde_json::Value = serde_json::from_str(&report.to_json()?)?;
    assert_eq!(json["items"][0]["table"], "orders");
    Ok(())
}

#[test]
fn test_duplicate_keys_in_snapshot() -> Result<()> {
    let fixture = Fixture::new()?;
    let dictionary = StaticDictionary::from_file(&fixture.schema)?;

    let findings = duplicate_key_check(&dictionary, &["shop".to_string()]);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].table, "orders");
    assert_eq!(findings[0].key, "idx_status");
    assert_eq!(findings[0].covered_by, "idx_status_created");
    Ok(())
}

#[test]
fn test_config_file_and_cli() -> Result<()> {
    let fixture = Fixture::new()?;
    let config_path = fixture.dir.path().join("advisor.json");
    fs::write(&config_path, r#"{"sampling": false, "max_index_columns": 2}"#)?;
    let output_path = fixture.dir.path().join("report.json");

    let status = Command::new(env!("CARGO_BIN_EXE_starindex"))
        .args(["advise", "--schema"])
        .arg(&fixture.schema)
        .arg("--config")
        .arg(&config_path)
        .args([
            "--query",
            "SELECT * FROM orders WHERE customer_id = 1 AND status = 'x' AND created_at = NOW()",
            "--format",
            "json",
            "--output",
        ])
        .arg(&output_path)
        .status()?;
    assert!(status.success());

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&output_path)?)?;
    let items = json["items"].as_array().cloned().unwrap_or_default();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["content"][0], "column `customer_id`");
    assert_eq!(
        items[0]["merged_ddl"],
        "ALTER TABLE `shop`.`orders` ADD INDEX `idx_customer_id_created_at` (`customer_id`, `created_at`)"
    );

    let status = Command::new(env!("CARGO_BIN_EXE_starindex"))
        .args(["advise", "--query", "SELEC nonsense"])
        .status()?;
    assert!(!status.success());
    Ok(())
}

//! Weapon class-id catalogs: `weapon_classID` (cross-market) and
//! `yyyp_weapon_classID` (YouPin commodity ids).

use super::Repository;
use crate::db::entities::{WEAPON_CLASS_ID, YYYP_WEAPON_CLASS_ID};
use crate::db::facade::{Filter, InsertOutcome, QueryError};
use crate::db::record::Record;
use crate::db::value::SqlValue;
use crate::domain::primitives::lenient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

/// Upper bound on listing-name suggestions.
const LISTING_SEARCH_LIMIT: i64 = 20;

/// Equality filters over weapon_type / weapon_name / item_name. Blank fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WeaponSearch {
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub weapon_type: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub weapon_name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub item_name: Option<String>,
}

impl WeaponSearch {
    fn filter(&self) -> Filter {
        [
            ("weapon_type", &self.weapon_type),
            ("weapon_name", &self.weapon_name),
            ("item_name", &self.item_name),
        ]
        .into_iter()
        .fold(Filter::new(), |f, (col, v)| match v {
            Some(v) => f.eq(col, v.as_str()),
            None => f,
        })
    }
}

/// BUFF goods id for a Steam market hash name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuffIdEntry {
    #[serde(deserialize_with = "lenient::opt_i64", default)]
    pub buff_id: Option<i64>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub steam_hash_name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub buff_class_name: Option<String>,
}

/// Steam market hash name with its localized names.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HashNameEntry {
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub data_hash_name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub market_listing_item_name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub weapon_type: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub weapon_name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string", default)]
    pub item_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogReport {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl CatalogReport {
    pub fn success_count(&self) -> usize {
        self.inserted + self.updated
    }
}

fn now() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

impl Repository {
    // =========================================================================
    // yyyp_weapon_classID
    // =========================================================================

    /// Insert or refresh YouPin weapons by `Id`.
    ///
    /// `updated_at` is always stamped; `created_at` only on insert.
    pub async fn upsert_yyyp_weapons(&self, weapons: &[Value]) -> Result<CatalogReport, QueryError> {
        let mut report = CatalogReport::default();
        for weapon in weapons {
            let mut record = Record::from_json(&YYYP_WEAPON_CLASS_ID, weapon);
            if !record.has_complete_key() {
                report.skipped += 1;
                continue;
            }
            record.set("created_at", SqlValue::Null);
            record.set("updated_at", now());
            let existed = self.db.exists(&record).await?;
            if !existed {
                record.set("created_at", now());
            }
            match self.db.save(&mut record).await {
                Ok(_) if existed => report.updated += 1,
                Ok(_) => report.inserted += 1,
                Err(e) => {
                    warn!("Failed to save yyyp weapon {:?}: {}", weapon.get("Id"), e);
                    report.skipped += 1;
                }
            }
        }
        info!(
            "YouPin weapons: {} inserted, {} updated, {} skipped",
            report.inserted, report.updated, report.skipped
        );
        Ok(report)
    }

    /// Insert a single weapon; an existing `Id` is reported as a duplicate.
    pub async fn insert_yyyp_weapon(
        &self,
        weapon: &Value,
    ) -> Result<(InsertOutcome, Value), QueryError> {
        let stamp = now();
        let mut record = Record::from_json(&YYYP_WEAPON_CLASS_ID, weapon)
            .with("created_at", stamp.as_str())
            .with("updated_at", stamp.as_str());
        let outcome = self.db.insert_record(&mut record).await?;
        Ok((outcome, record.to_json()))
    }

    pub async fn yyyp_weapon(&self, id: i64) -> Result<Option<Value>, QueryError> {
        Ok(self
            .db
            .find_by_id(&YYYP_WEAPON_CLASS_ID, &[("Id", id.into())])
            .await?
            .map(|r| r.to_json()))
    }

    pub async fn search_yyyp_weapons(&self, search: &WeaponSearch) -> Result<Vec<Value>, QueryError> {
        let records = self
            .db
            .find_all(&YYYP_WEAPON_CLASS_ID, &search.filter())
            .await?;
        Ok(records.iter().map(Record::to_json).collect())
    }

    pub async fn yyyp_weapons_by_type(&self, weapon_type: &str) -> Result<Vec<Value>, QueryError> {
        let search = WeaponSearch {
            weapon_type: Some(weapon_type.to_string()),
            ..Default::default()
        };
        self.search_yyyp_weapons(&search).await
    }

    pub async fn count_yyyp_weapons(&self) -> Result<i64, QueryError> {
        self.db.count(&YYYP_WEAPON_CLASS_ID, &Filter::new()).await
    }

    pub async fn delete_yyyp_weapon(&self, id: i64) -> Result<bool, QueryError> {
        let record = Record::new(&YYYP_WEAPON_CLASS_ID).with("Id", id);
        self.db.delete_record(&record).await
    }

    // =========================================================================
    // weapon_classID
    // =========================================================================

    /// Attach BUFF ids to hash names, inserting hash names not seen before.
    pub async fn upsert_buff_ids(&self, entries: &[BuffIdEntry]) -> Result<CatalogReport, QueryError> {
        let mut report = CatalogReport::default();
        for entry in entries {
            let (Some(buff_id), Some(hash_name)) = (entry.buff_id, entry.steam_hash_name.as_deref()) else {
                report.skipped += 1;
                continue;
            };
            let affected = self
                .db
                .update(
                    "UPDATE \"weapon_classID\" SET \"buff_id\" = ?, \"buff_class_name\" = ? WHERE \"steam_hash_name\" = ?",
                    &[buff_id.into(), entry.buff_class_name.clone().into(), hash_name.into()],
                )
                .await?;
            if affected > 0 {
                report.updated += 1;
                continue;
            }
            let mut record = Record::new(&WEAPON_CLASS_ID)
                .with("steam_hash_name", hash_name)
                .with("buff_id", buff_id)
                .with("buff_class_name", entry.buff_class_name.clone());
            match self.db.insert_record(&mut record).await? {
                InsertOutcome::Inserted => report.inserted += 1,
                InsertOutcome::Duplicate => report.skipped += 1,
            }
        }
        info!(
            "BUFF ids: {} updated, {} inserted, {} skipped",
            report.updated, report.inserted, report.skipped
        );
        Ok(report)
    }

    /// Insert new hash names; existing ones are left untouched.
    pub async fn insert_steam_hash_names(
        &self,
        entries: &[HashNameEntry],
    ) -> Result<CatalogReport, QueryError> {
        let mut report = CatalogReport::default();
        for entry in entries {
            let Some(hash_name) = entry.data_hash_name.as_deref() else {
                report.skipped += 1;
                continue;
            };
            let affected = self
                .db
                .execute(
                    "INSERT OR IGNORE INTO \"weapon_classID\" (\"steam_hash_name\", \"weapon_type\", \"weapon_name\", \"item_name\", \"market_listing_item_name\") VALUES (?, ?, ?, ?, ?)",
                    &[
                        hash_name.into(),
                        entry.weapon_type.clone().into(),
                        entry.weapon_name.clone().into(),
                        entry.item_name.clone().into(),
                        entry.market_listing_item_name.clone().into(),
                    ],
                )
                .await?;
            if affected > 0 {
                report.inserted += 1;
            } else {
                report.skipped += 1;
            }
        }
        Ok(report)
    }

    /// Listing names containing `keyword`, at most 20, duplicates kept.
    pub async fn search_listing_names(&self, keyword: &str) -> Result<Vec<String>, QueryError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Ok(Vec::new());
        }
        let filter = Filter::new()
            .condition(
                "\"market_listing_item_name\" LIKE ?",
                vec![format!("%{}%", keyword).into()],
            )
            .limit(LISTING_SEARCH_LIMIT);
        Ok(self
            .db
            .find_all(&WEAPON_CLASS_ID, &filter)
            .await?
            .iter()
            .filter_map(|r| r.get("market_listing_item_name").and_then(SqlValue::to_text))
            .collect())
    }

    pub async fn search_weapons(&self, search: &WeaponSearch) -> Result<Vec<Value>, QueryError> {
        let records = self.db.find_all(&WEAPON_CLASS_ID, &search.filter()).await?;
        Ok(records.iter().map(Record::to_json).collect())
    }

    pub async fn weapon_by_buff_id(&self, buff_id: i64) -> Result<Option<Value>, QueryError> {
        let filter = Filter::new().eq("buff_id", buff_id).limit(1);
        Ok(self
            .db
            .find_all(&WEAPON_CLASS_ID, &filter)
            .await?
            .first()
            .map(Record::to_json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repo::test_support::setup_test_repo;
    use serde_json::json;

    #[tokio::test]
    async fn test_yyyp_upsert_keeps_created_at() {
        let (repo, _tmp) = setup_test_repo().await;
        let weapons = vec![
            json!({"Id": 1, "CommodityName": "AK-47 | 红线", "weapon_type": "步枪"}),
            json!({"Id": "2", "weapon_type": "手枪"}),
            json!({"CommodityName": "no id"}),
        ];
        let report = repo.upsert_yyyp_weapons(&weapons).await.unwrap();
        assert_eq!(report, CatalogReport { inserted: 2, updated: 0, skipped: 1 });

        let before = repo.yyyp_weapon(1).await.unwrap().unwrap();
        let report = repo
            .upsert_yyyp_weapons(&[json!({"Id": 1, "weapon_name": "AK-47"})])
            .await
            .unwrap();
        assert_eq!(report.updated, 1);

        let after = repo.yyyp_weapon(1).await.unwrap().unwrap();
        assert_eq!(after["created_at"], before["created_at"]);
        assert_eq!(after["weapon_name"], json!("AK-47"));
        assert_eq!(after["CommodityName"], json!("AK-47 | 红线"));

        assert_eq!(repo.yyyp_weapons_by_type("手枪").await.unwrap().len(), 1);
        assert_eq!(repo.count_yyyp_weapons().await.unwrap(), 2);
        assert!(repo.delete_yyyp_weapon(2).await.unwrap());
        assert!(!repo.delete_yyyp_weapon(2).await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_single_yyyp_weapon_rejects_duplicate() {
        let (repo, _tmp) = setup_test_repo().await;
        let weapon = json!({"Id": 7, "CommodityName": "蝴蝶刀"});
        let (first, _) = repo.insert_yyyp_weapon(&weapon).await.unwrap();
        let (second, _) = repo.insert_yyyp_weapon(&weapon).await.unwrap();
        assert_eq!(first, InsertOutcome::Inserted);
        assert_eq!(second, InsertOutcome::Duplicate);
    }

    #[tokio::test]
    async fn test_buff_ids_update_or_insert() {
        let (repo, _tmp) = setup_test_repo().await;
        let names: Vec<HashNameEntry> = serde_json::from_value(json!([
            {"data_hash_name": "AK-47 | Redline (Field-Tested)",
             "market_listing_item_name": "AK-47 | 红线 (久经沙场)", "weapon_type": "步枪"},
            {"market_listing_item_name": "missing hash"}
        ]))
        .unwrap();
        let report = repo.insert_steam_hash_names(&names).await.unwrap();
        assert_eq!(report, CatalogReport { inserted: 1, updated: 0, skipped: 1 });
        let again = repo.insert_steam_hash_names(&names[..1]).await.unwrap();
        assert_eq!(again.skipped, 1);

        let entries: Vec<BuffIdEntry> = serde_json::from_value(json!([
            {"buff_id": 33815, "steam_hash_name": "AK-47 | Redline (Field-Tested)", "buff_class_name": "红线"},
            {"buff_id": "900", "steam_hash_name": "M4A1-S | Printstream (Minimal Wear)"},
            {"steam_hash_name": "no id"}
        ]))
        .unwrap();
        let report = repo.upsert_buff_ids(&entries).await.unwrap();
        assert_eq!(report, CatalogReport { inserted: 1, updated: 1, skipped: 1 });

        let weapon = repo.weapon_by_buff_id(33815).await.unwrap().unwrap();
        assert_eq!(weapon["weapon_type"], json!("步枪"));
        assert_eq!(weapon["buff_class_name"], json!("红线"));

        let search = WeaponSearch {
            weapon_type: Some("步枪".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.search_weapons(&search).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_listing_name_search() {
        let (repo, _tmp) = setup_test_repo().await;
        let entries: Vec<HashNameEntry> = (0..25)
            .map(|i| HashNameEntry {
                data_hash_name: Some(format!("hash-{}", i)),
                market_listing_item_name: Some(format!("AK-47 | 红线 #{}", i)),
                ..Default::default()
            })
            .collect();
        repo.insert_steam_hash_names(&entries).await.unwrap();

        assert_eq!(repo.search_listing_names("红线").await.unwrap().len(), 20);
        assert!(repo.search_listing_names("   ").await.unwrap().is_empty());
        assert!(repo.search_listing_names("火蛇").await.unwrap().is_empty());
    }
}
